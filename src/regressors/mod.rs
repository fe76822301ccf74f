//! Time scaling and regressor matrices: Fourier seasonality and holiday indicators.

mod design;
mod fourier;
mod holidays;
mod time_index;

pub use design::{BlockKind, DesignMatrix, FeatureBlock, FeatureColumn, FeatureLayout};
pub use fourier::{days_since_epoch, fourier_features, SeasonalComponent};
pub use holidays::{HolidayCalendar, HolidayColumn, HolidayEvent};
pub use time_index::{TimeIndex, MIN_OBSERVATIONS};
