/// How a single vehicle is doing against its schedule.
///
/// | Delay (s)     | Class    |
/// |---------------|----------|
/// | > 30          | Late     |
/// | < -30         | Early    |
/// | otherwise     | OnTime   |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Punctuality {
    Early,
    OnTime,
    Late,
}

impl Punctuality {
    pub fn from_delay(delay_seconds: i64) -> Self {
        match delay_seconds {
            d if d > 30 => Punctuality::Late,
            d if d < -30 => Punctuality::Early,
            _ => Punctuality::OnTime,
        }
    }
}

/// Health of a line from its mean delay, early or late alike.
///
/// | abs(mean)     | Health |
/// |---------------|--------|
/// | < 3 min       | Good   |
/// | < 8 min       | Fair   |
/// | otherwise     | Poor   |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineHealth {
    Good,
    Fair,
    Poor,
}

impl LineHealth {
    pub fn from_mean_delay(mean_seconds: f64) -> Self {
        match mean_seconds.abs() / 60.0 {
            m if m < 3.0 => LineHealth::Good,
            m if m < 8.0 => LineHealth::Fair,
            _ => LineHealth::Poor,
        }
    }
}
