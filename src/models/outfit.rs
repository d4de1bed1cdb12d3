use serde::{Deserialize, Serialize};

/// Surf outfit tiers by water temperature (°C).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outfit {
    FullWetsuit,
    Wetsuit32,
    Shorty,
    Thermolycra,
    Rashguard,
}

impl Outfit {
    /// Below 15 full suit, [15, 20) 3/2mm, [20, 24) shorty, [24, 25] top, above 25 rashguard.
    pub fn for_water_temp(celsius: f64) -> Self {
        if celsius < 15.0 {
            Outfit::FullWetsuit
        } else if celsius < 20.0 {
            Outfit::Wetsuit32
        } else if celsius < 24.0 {
            Outfit::Shorty
        } else if celsius <= 25.0 {
            Outfit::Thermolycra
        } else {
            Outfit::Rashguard
        }
    }

    pub fn advice(&self) -> &'static str {
        match self {
            Outfit::FullWetsuit => "A 4/3mm or 5/4/3mm full-length wetsuit is recommended.",
            Outfit::Wetsuit32 => "A 3/2mm wetsuit is ideal.",
            Outfit::Shorty => "A 2mm shorty will be sufficient.",
            Outfit::Thermolycra => "A Thermolycra or neoprene top is usually recommended.",
            Outfit::Rashguard => "A bathing suit or rashguard is sufficient.",
        }
    }

    pub fn suggestion_for(celsius: f64) -> String {
        format!(
            "For an average water temperature of {:.2}°C: {}",
            celsius,
            Self::for_water_temp(celsius).advice()
        )
    }
}

impl std::fmt::Display for Outfit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.advice())
    }
}
