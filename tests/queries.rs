//! Cached queries and optimistic mutations against the mock API

mod mock_api;

use std::collections::BTreeSet;
use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::NaiveDate;
use energy_dash::dashboard::{toggle_favourite, ToggleOutcome, ViewSignature, DEFAULT_FORECAST_LABEL};
use energy_dash::models::{AlertIn, Direction, FavouriteIn, ForecastModel, ForecastParams};
use energy_dash::queries::TEMP_ID_PREFIX;
use energy_dash::{ApiError, QueryKey};
use mock_api::{energy_row, MockApi};

fn favourite(name: &str) -> FavouriteIn {
    FavouriteIn {
        name: name.to_string(),
        config_json: serde_json::json!({ "day": "2024-05-02", "hidden": [], "fcMetric": DEFAULT_FORECAST_LABEL }),
    }
}

async fn wait_for<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached");
}

#[tokio::test]
async fn test_energy_served_from_cache_while_fresh() {
    let api = MockApi::start().await;
    api.state.seed_energy(vec![
        energy_row("r2", "2024-05-02T09:00:00", 4200.0),
        energy_row("r1", "2024-05-02T08:00:00", 4000.0),
    ]);
    let dash = api.logged_in().await;

    let first = dash.energy.fetch().await.unwrap();
    let second = dash.energy.fetch().await.unwrap();
    assert_eq!(api.state.energy_calls.load(Ordering::SeqCst), 1);
    assert_eq!(first, second);

    // Sorted by timestamp, decimal strings decoded
    assert_eq!(first[0].id, "r1");
    assert_eq!(first[1].consumption_kwh, 4200.0);
    assert_eq!(first[1].wind_kwh, 1200.5);

    dash.energy.refetch().await.unwrap();
    assert_eq!(api.state.energy_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_energy_poller_publishes_snapshots() {
    let api = MockApi::start().await;
    api.state.seed_energy(vec![energy_row("r1", "2024-05-02T08:00:00", 4000.0)]);
    let dash = api.logged_in().await;

    let (handle, mut rx) = dash.energy.clone().spawn_polling();
    tokio::time::timeout(Duration::from_secs(5), rx.changed())
        .await
        .unwrap()
        .unwrap();

    let state = rx.borrow_and_update().clone();
    assert!(!state.is_loading);
    assert!(state.error.is_none());
    assert_eq!(state.latest().map(|r| r.id.as_str()), Some("r1"));
    assert!(state.updated_at.is_some());

    drop(rx);
    handle.abort();
}

#[tokio::test]
async fn test_optimistic_add_reconciles_with_server_id() {
    let api = MockApi::start().await;
    let dash = api.logged_in().await;
    assert!(dash.favourites.list().await.unwrap().is_empty());

    api.state.hold_creates.store(true, Ordering::SeqCst);
    let favourites = dash.favourites.clone();
    let pending = tokio::spawn(async move { favourites.add(favourite("View 05/02")).await });

    // Placeholder is visible before the server answers
    let cached = {
        let favourites = dash.favourites.clone();
        move || {
            favourites
                .cached()
                .is_some_and(|list| list.iter().any(|f| f.id.starts_with(TEMP_ID_PREFIX)))
        }
    };
    wait_for(cached).await;
    assert!(dash.favourites.is_adding());
    assert_eq!(dash.favourites.cached().unwrap()[0].name, "View 05/02");

    api.state.release.notify_one();
    let saved = pending.await.unwrap().unwrap();
    assert_eq!(saved.id, "fav-1");
    assert!(!dash.favourites.is_adding());

    let cached = dash.favourites.cached().unwrap();
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].id, "fav-1");
    assert!(dash.cache.status(&QueryKey::Favourites).unwrap().invalidated);

    // Next read goes back to the server
    let lists_before = api.state.favourite_lists.load(Ordering::SeqCst);
    let listed = dash.favourites.list().await.unwrap();
    assert_eq!(listed, vec![saved]);
    assert_eq!(api.state.favourite_lists.load(Ordering::SeqCst), lists_before + 1);
}

#[tokio::test]
async fn test_add_before_first_list_does_not_hide_server_items() {
    let api = MockApi::start().await;
    let dash = api.logged_in().await;
    dash.favourites.add(favourite("a")).await.unwrap();
    dash.favourites.add(favourite("b")).await.unwrap();
    dash.cache.clear();

    api.state.hold_creates.store(true, Ordering::SeqCst);
    let favourites = dash.favourites.clone();
    let pending = tokio::spawn(async move { favourites.add(favourite("c")).await });
    wait_for(|| dash.favourites.is_adding()).await;

    // Only a placeholder is cached, so the list comes from the server
    let lists_before = api.state.favourite_lists.load(Ordering::SeqCst);
    let listed = dash.favourites.list().await.unwrap();
    assert_eq!(api.state.favourite_lists.load(Ordering::SeqCst), lists_before + 1);
    assert_eq!(listed.iter().map(|f| f.name.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);

    api.state.release.notify_one();
    pending.await.unwrap().unwrap();
    let listed = dash.favourites.list().await.unwrap();
    assert_eq!(listed.iter().map(|f| f.name.as_str()).collect::<Vec<_>>(), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_failed_add_rolls_back() {
    let api = MockApi::start().await;
    let dash = api.logged_in().await;
    dash.favourites.add(favourite("keep")).await.unwrap();

    api.state.fail_creates.store(true, Ordering::SeqCst);
    let err = dash.favourites.add(favourite("lost")).await.unwrap_err();

    assert_eq!(err.status(), Some(500));
    assert_eq!(err.to_string(), "API Error: database unavailable");
    let cached = dash.favourites.cached().unwrap();
    assert_eq!(cached.iter().map(|f| f.name.as_str()).collect::<Vec<_>>(), vec!["keep"]);
    assert_eq!(api.state.favourites().len(), 1);
}

#[tokio::test]
async fn test_failed_remove_restores_position() {
    let api = MockApi::start().await;
    let dash = api.logged_in().await;
    for name in ["a", "b", "c"] {
        dash.favourites.add(favourite(name)).await.unwrap();
    }
    let before = dash.favourites.list().await.unwrap();
    assert_eq!(before.len(), 3);

    api.state.fail_deletes.store(true, Ordering::SeqCst);
    assert!(dash.favourites.remove(&before[1].id).await.is_err());
    assert_eq!(dash.favourites.cached().unwrap(), before);

    api.state.fail_deletes.store(false, Ordering::SeqCst);
    dash.favourites.remove(&before[1].id).await.unwrap();
    let after = dash.favourites.list().await.unwrap();
    assert_eq!(after.iter().map(|f| f.name.as_str()).collect::<Vec<_>>(), vec!["a", "c"]);
}

#[tokio::test]
async fn test_toggle_favourite_view() {
    let api = MockApi::start().await;
    let dash = api.logged_in().await;
    let hidden: BTreeSet<String> = ["Wind".to_string()].into_iter().collect();
    let view = ViewSignature::new(
        NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
        &hidden,
        DEFAULT_FORECAST_LABEL,
    );

    let added = match toggle_favourite(&dash.favourites, &view).await.unwrap() {
        ToggleOutcome::Added(fav) => fav,
        other => panic!("expected add, got {other:?}"),
    };
    assert_eq!(added.name, "View 05/02");
    assert_eq!(api.state.favourites()[0]["config_json"]["hidden"], serde_json::json!(["Wind"]));

    match toggle_favourite(&dash.favourites, &view).await.unwrap() {
        ToggleOutcome::Removed(fav) => assert_eq!(fav.id, added.id),
        other => panic!("expected removal, got {other:?}"),
    }
    assert!(api.state.favourites().is_empty());
}

#[tokio::test]
async fn test_alert_fires_once_for_latest_reading() {
    let api = MockApi::start().await;
    api.state.seed_energy(vec![
        energy_row("r1", "2024-05-02T08:00:00", 4000.0),
        energy_row("r2", "2024-05-02T09:00:00", 5200.0),
    ]);
    let dash = api.logged_in().await;

    let alert = dash
        .alerts
        .add(AlertIn {
            metric: "consumption_kwh".into(),
            threshold: 5000.0,
            direction: Direction::Above,
        })
        .await
        .unwrap();
    assert_eq!(alert.threshold, 5000.0);

    let fired = dash.check_alerts().await.unwrap();
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].alert_id, alert.id);
    assert_eq!(fired[0].reading_id, "r2");
    assert_eq!(fired[0].message(), "consumption_kwh: 5200 kWh (above 5000)");

    assert!(dash.check_alerts().await.unwrap().is_empty());
    assert_eq!(dash.triggered().len(), 1);

    dash.alerts.remove(&alert.id).await.unwrap();
    assert!(dash.alerts.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_forecast_is_lazy_and_keyed_by_params() {
    let api = MockApi::start().await;
    let dash = api.logged_in().await;
    let params = ForecastParams::new("Demand").horizon(48).model(ForecastModel::Prophet);

    assert_eq!(dash.forecast.fetch(&params).await.unwrap(), None);
    assert_eq!(api.state.forecast_calls.load(Ordering::SeqCst), 0);

    dash.forecast.set_enabled(true);
    let points = dash.forecast.fetch(&params).await.unwrap().unwrap();
    assert_eq!(points.len(), 48);
    assert_eq!(points[0].value(), -50.0);
    dash.forecast.fetch(&params).await.unwrap();
    assert_eq!(api.state.forecast_calls.load(Ordering::SeqCst), 1);

    let shorter = params.clone().horizon(24);
    assert_eq!(dash.forecast.fetch(&shorter).await.unwrap().unwrap().len(), 24);
    assert_eq!(api.state.forecast_calls.load(Ordering::SeqCst), 2);

    let invalid = params.horizon(0);
    let err = dash.forecast.fetch(&invalid).await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidRequest(_)));
    assert_eq!(api.state.forecast_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_expired_session_clears_cache_and_rearms_alerts() {
    let api = MockApi::start().await;
    api.state.seed_energy(vec![energy_row("r1", "2024-05-02T09:00:00", 5200.0)]);
    let dash = api.logged_in().await;
    let listener = dash.spawn_session_listener();

    dash.alerts
        .add(AlertIn {
            metric: "consumption_kwh".into(),
            threshold: 5000.0,
            direction: Direction::Above,
        })
        .await
        .unwrap();
    assert_eq!(dash.check_alerts().await.unwrap().len(), 1);
    let alerts = dash.alerts.list().await.unwrap();
    let latest = dash.energy.fetch().await.unwrap().last().cloned().unwrap();
    assert!(dash.evaluate(&alerts, &latest).is_empty());
    assert!(!dash.cache.is_empty());

    api.state.reject_all_tokens.store(true, Ordering::SeqCst);
    let err = dash.energy.refetch().await.unwrap_err();
    assert!(matches!(err, ApiError::SessionExpired));

    wait_for(|| dash.cache.is_empty()).await;
    assert!(dash.triggered().is_empty());
    assert_eq!(dash.evaluate(&alerts, &latest).len(), 1);

    listener.abort();
}
