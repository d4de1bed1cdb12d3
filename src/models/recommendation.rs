use super::window::VacationWindow;
use crate::error::ErrorClass;
use serde::{Deserialize, Serialize};

/// A JSON scalar that may arrive as a number or as numeric text from a form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberOrText {
    Number(f64),
    Text(String),
}

impl NumberOrText {
    pub fn as_f64(&self) -> Option<f64> {
        let value: Option<f64> = match self {
            NumberOrText::Number(n) => Some(*n),
            NumberOrText::Text(s) => s.trim().parse().ok(),
        };
        value.filter(|n| n.is_finite())
    }
}

/// Body of a vacation-window query as received from the web layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecommendationRequest {
    #[serde(default)]
    pub wave_height: Option<NumberOrText>,
    #[serde(default)]
    pub num_days: Option<NumberOrText>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

impl RecommendationRequest {
    pub fn new(
        wave_height: f64,
        num_days: usize,
        start_date: impl Into<String>,
        end_date: impl Into<String>,
    ) -> Self {
        Self {
            wave_height: Some(NumberOrText::Number(wave_height)),
            num_days: Some(NumberOrText::Number(num_days as f64)),
            start_date: Some(start_date.into()),
            end_date: Some(end_date.into()),
        }
    }
}

/// Locations of the two charts rendered for one recommended window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartRef {
    pub location: String,
    pub wvht: String,
    pub wtmp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub message: String,
    /// Ranked windows rendered as text, days separated by `<br>`.
    pub html: String,
    pub windows: Vec<VacationWindow>,
    pub outfit_suggestion: String,
    pub graphs: Vec<ChartRef>,
    /// True when the windows come from the search after the requested range.
    pub fallback: bool,
}

impl RecommendationResponse {
    pub fn no_matches(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            html: "No matches available.".into(),
            windows: Vec::new(),
            outfit_suggestion: "No outfit suggestion available.".into(),
            graphs: Vec::new(),
            fallback: false,
        }
    }

    pub fn best_window(&self) -> Option<&VacationWindow> {
        self.windows.first()
    }
}

/// A failure at the service boundary. `message` is always safe to show a user.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceError {
    pub class: ErrorClass,
    pub message: String,
}

impl ServiceError {
    pub fn new(class: ErrorClass, message: impl Into<String>) -> Self {
        Self {
            class,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> u16 {
        self.class.status_code()
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ServiceError {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl From<&ServiceError> for ErrorBody {
    fn from(err: &ServiceError) -> Self {
        Self {
            error: err.message.clone(),
        }
    }
}
