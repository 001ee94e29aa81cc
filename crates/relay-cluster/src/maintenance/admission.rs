use std::cmp::Ordering;

use relay_model::InstanceStatus;

/// Fleet average load above which only less loaded instances compete.
const BUSY_FLEET_LOAD: f64 = 0.5;

/// Whether this instance should take new sessions.
///
/// A full instance declines. Otherwise a lone instance accepts, a newer image
/// accepts and an older one declines, the proposed leader accepts since it
/// stays around longest. Among equals the first instance id, in order, of
/// those below the fleet average accepts; when the fleet is busy an instance
/// at or above the average keeps accepting too.
pub fn should_accept(
    instance_id: &str,
    own_load: f64,
    is_proposed_leader: bool,
    recentness: Ordering,
    live: &[InstanceStatus],
) -> bool {
    if own_load >= 1.0 {
        return false;
    }
    let peers: Vec<&InstanceStatus> = live
        .iter()
        .filter(|s| s.instance_id != instance_id)
        .collect();
    if peers.is_empty() {
        return true;
    }
    match recentness {
        Ordering::Greater => return true,
        Ordering::Less => return false,
        Ordering::Equal => {}
    }
    if is_proposed_leader {
        return true;
    }

    let loads = peers
        .iter()
        .map(|s| (s.instance_id.as_str(), s.load))
        .chain(std::iter::once((instance_id, own_load)));
    let avg = loads.clone().map(|(_, l)| l).sum::<f64>() / (peers.len() + 1) as f64;

    let mut candidates: Vec<&str> = if avg >= BUSY_FLEET_LOAD {
        if own_load >= avg {
            return true;
        }
        loads.filter(|(_, l)| *l < avg).map(|(id, _)| id).collect()
    } else {
        loads.map(|(id, _)| id).collect()
    };
    candidates.sort_unstable();
    candidates.first() == Some(&instance_id)
}
