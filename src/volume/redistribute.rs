use crate::snapcast::types::ClientId;

/// A client's volume as seen by the redistribution engine.
#[derive(Clone, Debug, PartialEq)]
pub struct ClientVolume {
    pub id: ClientId,
    pub percent: f64,
}

impl ClientVolume {
    pub fn new(id: impl Into<ClientId>, percent: f64) -> Self {
        Self { id: id.into(), percent }
    }
}

/// Moves a group's average volume towards `target`, scaling every client
/// proportionally towards 0 (quieter) or towards 100 (louder).
///
/// `current_average` must be the mean of `percent` over `clients`. The result
/// keeps the input order. When the ratio is undefined (lowering from an
/// average of 0, raising from an average of 100) the input is returned as is.
///
/// This is a per-client nudge, not an exact-mean solver: for heterogeneous
/// groups the new average only approximates `target`.
pub fn redistribute(clients: &[ClientVolume], current_average: f64, target: f64) -> Vec<ClientVolume> {
    let delta = target - current_average;

    if delta < 0.0 {
        if current_average <= 0.0 {
            tracing::debug!("group already silent, skipping volume redistribution");
            return clients.to_vec();
        }
        let ratio = (current_average - target) / current_average;
        scale(clients, |percent| percent - ratio * percent)
    } else {
        if current_average >= 100.0 {
            tracing::debug!("group already at full volume, skipping volume redistribution");
            return clients.to_vec();
        }
        let ratio = (target - current_average) / (100.0 - current_average);
        scale(clients, |percent| percent + ratio * (100.0 - percent))
    }
}

fn scale(clients: &[ClientVolume], f: impl Fn(f64) -> f64) -> Vec<ClientVolume> {
    clients
        .iter()
        .map(|c| ClientVolume {
            id: c.id.clone(),
            percent: f(c.percent).clamp(0.0, 100.0),
        })
        .collect()
}

/// Arithmetic mean, `0.0` for an empty set.
pub fn average_percent<I>(percents: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let (sum, count) = percents
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), p| (sum + p, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Snapcast carries volume as an integer percent.
pub fn to_snapcast_percent(percent: f64) -> u8 {
    percent.round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn clients(percents: &[f64]) -> Vec<ClientVolume> {
        percents
            .iter()
            .enumerate()
            .map(|(i, p)| ClientVolume::new(format!("client{}", i + 1), *p))
            .collect()
    }

    fn percents(out: &[ClientVolume]) -> Vec<f64> {
        out.iter().map(|c| c.percent).collect()
    }

    #[test]
    fn test_raise_two_clients() {
        let out = redistribute(&clients(&[20.0, 80.0]), 50.0, 70.0);
        let p = percents(&out);
        assert!((p[0] - 52.0).abs() < EPS);
        assert!((p[1] - 88.0).abs() < EPS);
        assert_eq!(out[0].id, ClientId::from("client1"));
        assert_eq!(out[1].id, ClientId::from("client2"));
    }

    #[test]
    fn test_lower_two_clients() {
        let p = percents(&redistribute(&clients(&[20.0, 80.0]), 50.0, 30.0));
        assert!((p[0] - 12.0).abs() < EPS);
        assert!((p[1] - 48.0).abs() < EPS);
    }

    #[test]
    fn test_empty_input() {
        assert!(redistribute(&[], 0.0, 40.0).is_empty());
        assert!(redistribute(&[], 50.0, 10.0).is_empty());
    }

    #[test]
    fn test_single_client_reaches_target() {
        for start in [0.0, 13.0, 50.0, 99.0] {
            for target in [0.0, 7.0, 50.0, 64.0, 100.0] {
                let out = redistribute(&clients(&[start]), start, target);
                assert!(
                    (out[0].percent - target).abs() < EPS,
                    "start={} target={} got={}",
                    start,
                    target,
                    out[0].percent
                );
            }
        }
    }

    #[test]
    fn test_uniform_group_reaches_target() {
        let group = clients(&[35.0, 35.0, 35.0, 35.0]);
        for target in [0.0, 20.0, 35.0, 90.0, 100.0] {
            for c in redistribute(&group, 35.0, target) {
                assert!((c.percent - target).abs() < EPS);
            }
        }
    }

    #[test]
    fn test_same_target_is_noop() {
        let group = clients(&[10.0, 45.0, 95.0]);
        let avg = average_percent(group.iter().map(|c| c.percent));
        assert_eq!(percents(&redistribute(&group, avg, avg)), percents(&group));
    }

    #[test]
    fn test_silent_group_cannot_be_lowered() {
        let group = clients(&[0.0, 0.0]);
        assert_eq!(redistribute(&group, 0.0, 0.0), group);
    }

    #[test]
    fn test_full_group_is_skipped() {
        let group = clients(&[100.0, 100.0]);
        assert_eq!(redistribute(&group, 100.0, 100.0), group);
    }

    #[test]
    fn test_outputs_stay_in_range() {
        let group = clients(&[0.0, 1.0, 33.0, 67.0, 99.0, 100.0]);
        let avg = average_percent(group.iter().map(|c| c.percent));
        for target in (0..=100).map(f64::from) {
            for c in redistribute(&group, avg, target) {
                assert!((0.0..=100.0).contains(&c.percent));
            }
        }
    }

    #[test]
    fn test_average_percent() {
        assert_eq!(average_percent(Vec::new()), 0.0);
        assert_eq!(average_percent([20.0, 80.0]), 50.0);
    }

    #[test]
    fn test_to_snapcast_percent() {
        assert_eq!(to_snapcast_percent(51.6), 52);
        assert_eq!(to_snapcast_percent(-3.0), 0);
        assert_eq!(to_snapcast_percent(140.0), 100);
    }
}
