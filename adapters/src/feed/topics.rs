use engine::band::Band;
use engine::filter::{Direction, MonitorMode};
use engine::spot::Mode;

const ROOT: &str = "pskr/filter/v2";

/// PSKReporter filter topics for a monitor mode.
///
/// Topic layout is `pskr/filter/v2/{band}/{mode}/{sender}/{receiver}/...`;
/// an empty mode or band list subscribes to all of them.
pub fn subscription_topics(mode: &MonitorMode, modes: &[Mode], bands: &[Band]) -> Vec<String> {
    let mode_slots: Vec<&str> = if modes.is_empty() {
        vec!["+"]
    } else {
        modes.iter().map(Mode::as_str).collect()
    };
    let band_slots: Vec<&str> = if bands.is_empty() {
        vec!["+"]
    } else {
        bands.iter().map(|b| b.as_str()).collect()
    };

    let mut topics = Vec::new();
    for band in &band_slots {
        for m in &mode_slots {
            match mode {
                MonitorMode::Detailed {
                    callsign,
                    direction,
                } => {
                    if matches!(direction, Direction::Rx | Direction::Dual) {
                        topics.push(format!("{ROOT}/{band}/{m}/+/{callsign}/#"));
                    }
                    if matches!(direction, Direction::Tx | Direction::Dual) {
                        topics.push(format!("{ROOT}/{band}/{m}/{callsign}/+/#"));
                    }
                }
                MonitorMode::Summary { .. } => topics.push(format!("{ROOT}/{band}/{m}/#")),
            }
        }
    }
    topics
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::spot::Callsign;

    fn detailed(direction: Direction) -> MonitorMode {
        MonitorMode::Detailed {
            callsign: Callsign::new("dl1abc").unwrap(),
            direction,
        }
    }

    #[test]
    fn rx_listens_on_receiver_slot() {
        let topics = subscription_topics(&detailed(Direction::Rx), &[], &[]);
        assert_eq!(topics, vec!["pskr/filter/v2/+/+/+/DL1ABC/#"]);
    }

    #[test]
    fn dual_listens_on_both_slots_per_mode() {
        let modes = [Mode::new("FT8").unwrap(), Mode::new("CW").unwrap()];
        let topics = subscription_topics(&detailed(Direction::Dual), &modes, &[]);
        assert_eq!(
            topics,
            vec![
                "pskr/filter/v2/+/FT8/+/DL1ABC/#",
                "pskr/filter/v2/+/FT8/DL1ABC/+/#",
                "pskr/filter/v2/+/CW/+/DL1ABC/#",
                "pskr/filter/v2/+/CW/DL1ABC/+/#",
            ]
        );
    }

    #[test]
    fn summary_subscribes_per_band_and_mode() {
        let topics = subscription_topics(
            &MonitorMode::Summary {
                sample_fraction: 0.1,
            },
            &[Mode::new("FT8").unwrap()],
            &[Band::M20, Band::M40],
        );
        assert_eq!(
            topics,
            vec!["pskr/filter/v2/20m/FT8/#", "pskr/filter/v2/40m/FT8/#"]
        );
    }
}
