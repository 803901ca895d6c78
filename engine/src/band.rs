use std::fmt;
use std::str::FromStr;

/// Amateur bands the bridge knows about, in ascending frequency order.
///
/// `Ord` follows the band plan; anything that needs a name-based order
/// (activity tie-breaks) compares [`Band::as_str`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Band {
    M2200,
    M630,
    M160,
    M80,
    M60,
    M40,
    M30,
    M20,
    M17,
    M15,
    M12,
    M10,
    M6,
    M4,
    M2,
    M1_25,
    Cm70,
    Cm23,
}

/// (band, lower edge MHz, upper edge MHz), inclusive on both ends.
const BAND_PLAN: &[(Band, f64, f64)] = &[
    (Band::M2200, 0.1357, 0.1378),
    (Band::M630, 0.472, 0.479),
    (Band::M160, 1.8, 2.0),
    (Band::M80, 3.5, 4.0),
    (Band::M60, 5.3, 5.41),
    (Band::M40, 7.0, 7.3),
    (Band::M30, 10.1, 10.15),
    (Band::M20, 14.0, 14.35),
    (Band::M17, 18.068, 18.168),
    (Band::M15, 21.0, 21.45),
    (Band::M12, 24.89, 24.99),
    (Band::M10, 28.0, 29.7),
    (Band::M6, 50.0, 54.0),
    (Band::M4, 70.0, 70.5),
    (Band::M2, 144.0, 148.0),
    (Band::M1_25, 222.0, 225.0),
    (Band::Cm70, 420.0, 450.0),
    (Band::Cm23, 1240.0, 1300.0),
];

impl Band {
    pub const ALL: [Band; 18] = [
        Band::M2200,
        Band::M630,
        Band::M160,
        Band::M80,
        Band::M60,
        Band::M40,
        Band::M30,
        Band::M20,
        Band::M17,
        Band::M15,
        Band::M12,
        Band::M10,
        Band::M6,
        Band::M4,
        Band::M2,
        Band::M1_25,
        Band::Cm70,
        Band::Cm23,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Band::M2200 => "2200m",
            Band::M630 => "630m",
            Band::M160 => "160m",
            Band::M80 => "80m",
            Band::M60 => "60m",
            Band::M40 => "40m",
            Band::M30 => "30m",
            Band::M20 => "20m",
            Band::M17 => "17m",
            Band::M15 => "15m",
            Band::M12 => "12m",
            Band::M10 => "10m",
            Band::M6 => "6m",
            Band::M4 => "4m",
            Band::M2 => "2m",
            Band::M1_25 => "1.25m",
            Band::Cm70 => "70cm",
            Band::Cm23 => "23cm",
        }
    }

    /// Looks the frequency up in the band plan. `None` outside every band.
    pub fn from_frequency_hz(hz: f64) -> Option<Band> {
        if !hz.is_finite() || hz <= 0.0 {
            return None;
        }
        let mhz = hz / 1_000_000.0;
        BAND_PLAN
            .iter()
            .find(|(_, low, high)| mhz >= *low && mhz <= *high)
            .map(|(band, _, _)| *band)
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownBand(pub String);

impl fmt::Display for UnknownBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown band `{}`", self.0)
    }
}

impl std::error::Error for UnknownBand {}

impl FromStr for Band {
    type Err = UnknownBand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Band::ALL
            .iter()
            .copied()
            .find(|b| b.as_str() == wanted)
            .ok_or_else(|| UnknownBand(s.to_string()))
    }
}
