//! Query layer
//!
//! Each query pairs an API call with a [`QueryCache`](crate::cache::QueryCache)
//! key and decides when cached data may be served.

pub mod alerts;
pub mod collection;
pub mod energy;
pub mod favourites;
pub mod forecast;

pub use alerts::{Alerts, AlertsQuery};
pub use collection::{Collection, CollectionQuery, TEMP_ID_PREFIX};
pub use energy::{EnergyQuery, EnergyState, Readings};
pub use favourites::{Favourites, FavouritesQuery};
pub use forecast::ForecastQuery;
