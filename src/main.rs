// Diagnostic entry point: loads configuration, builds the client and logs
// which backends answer and how much data each one holds.

use anyhow::Context;
use tracing::{info, warn};

use googalytics::core::reports::date_range_summary;
use googalytics::{GoogalyticsClient, GoogalyticsConfig, ReportKind};

fn describe(id: &Option<String>) -> &str {
    id.as_deref().unwrap_or("(not set)")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = GoogalyticsConfig::from_env().context("Failed to read configuration")?;
    info!("GA3 view id: {}", describe(&config.ga3_view_id));
    info!("GA4 property id: {}", describe(&config.ga4_property_id));
    info!("Search Console site: {}", describe(&config.gsc_site_url));
    info!("Google Ads customer id: {}", describe(&config.ads_customer_id));

    let client = GoogalyticsClient::from_config(config)
        .await
        .context("Failed to build the googalytics client")?;

    for kind in [ReportKind::Ga3, ReportKind::Ga4, ReportKind::Gsc] {
        let status = client.api_status(kind).await;
        info!("{} status: {}", kind, status);
        if !status.is_success() {
            continue;
        }
        match client.reports().available_dates(kind).await {
            Ok(dates) => info!(
                "{} data available: {}",
                kind,
                date_range_summary(&dates, "no dates with data")
            ),
            Err(e) => warn!("Could not list {} dates: {}", kind, e),
        }
    }

    match client.keyword_planner() {
        Some(planner) => info!(
            "Keyword planner ready for locations {:?}",
            planner.location_codes()
        ),
        None => info!("Keyword planner: not configured"),
    }

    Ok(())
}
