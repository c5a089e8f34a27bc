use std::sync::Arc;

use futures::channel::mpsc;
use laika_rs::{Backend, ClientBuilder, FeatureDetail, RouteParams};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // Reads LAIKA_URL and LAIKA_TIMEOUT_SECS
    let client = ClientBuilder::from_env().build()?;
    println!("Using {}", client.debug_info());

    println!("All features:");
    for feature in client.list_features().await? {
        println!("  {} ({}): {:?}", feature.name, feature.id, feature.status);
    }

    let detail = Arc::new(FeatureDetail::new(client));
    let (routes, params) = mpsc::unbounded();
    let subscription = detail.initialize(params);

    // Navigate to the detail page of one feature
    routes.unbounded_send(RouteParams::for_feature("my-feature"))?;
    drop(routes);
    subscription.join().await;

    if let Some(error) = detail.error().await {
        println!("Could not load my-feature: {}", error);
        return Ok(());
    }

    let enabled = detail
        .feature()
        .await
        .map(|f| f.is_enabled_in("production"))
        .unwrap_or(false);
    detail.toggle(!enabled, "production").await?;
    println!("my-feature in production is now: {}", !enabled);

    Ok(())
}
