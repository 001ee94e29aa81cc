//! Length-prefixed framing shared by every TCP link of the dispatch layer.
//!
//! Each frame is a 4-byte big-endian length followed by a JSON payload.
use std::{io, net::SocketAddr};

use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// Largest accepted frame.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

pub type FrameStream = Framed<TcpStream, LengthDelimitedCodec>;

/// Wrap an established stream in the frame codec.
pub fn frame(stream: TcpStream) -> FrameStream {
    let _ = stream.set_nodelay(true);
    LengthDelimitedCodec::builder()
        .max_frame_length(MAX_FRAME_LEN)
        .new_framed(stream)
}

pub async fn connect(addr: SocketAddr) -> io::Result<FrameStream> {
    let stream = TcpStream::connect(addr).await?;
    Ok(frame(stream))
}

/// Connect to a `host:port` target, resolving the host if needed.
pub async fn connect_to(target: &str) -> io::Result<FrameStream> {
    let stream = TcpStream::connect(target).await?;
    Ok(frame(stream))
}
