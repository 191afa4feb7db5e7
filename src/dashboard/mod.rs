//! Dashboard shaping
//!
//! Turns readings and forecasts into chart rows for one day, maps the current
//! view onto saved favourites, and bundles the client pieces a front end needs.

mod context;
mod series;
mod view;

pub use context::Dashboard;
pub use series::{day_range, day_rows, forecast_rows, ChartRow, DayRange, Series, SERIES};
pub use view::{
    favourite_name, find_favourite, toggle_favourite, ToggleOutcome, ViewSignature,
    DEFAULT_FORECAST_LABEL,
};
