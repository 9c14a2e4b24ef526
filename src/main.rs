use std::time::Duration;

use chrono::Local;
use han_bridge::{
    config::Config,
    identity, measurement,
    meter::{MeterClient, ProbeInfo},
    mqtt,
    poller::Poller,
};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let cfg_path =
        std::env::var("APP_CONFIG").unwrap_or_else(|_| "config/config.example.yaml".into());
    let cfg = Config::load(&cfg_path)?;
    info!(
        device = %cfg.device.host,
        interval = cfg.device.poll_interval_secs,
        "loaded config"
    );

    let client = MeterClient::new(cfg.device.host.clone())?;

    // One-shot identity probe. Failure is not fatal: the bridge starts with
    // default identity and fills in live data as polling succeeds.
    let probe = match client.probe().await {
        Ok(found) => {
            info!(
                mac = ?found.mac,
                serial = ?found.serial,
                "device probe ok"
            );
            found
        }
        Err(e) => {
            warn!("device probe failed, starting with default identity: {e}");
            ProbeInfo::default()
        }
    };

    let descriptors = measurement::descriptor_table(&probe, &cfg.device.host);
    info!("exposing {} measurements", descriptors.len());

    let (mqtt_client, mut eventloop) = mqtt::connect(&cfg.mqtt);
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(_) => {}
                Err(e) => {
                    error!("MQTT event loop error: {}", e);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    });
    info!(broker = %cfg.mqtt.host, "MQTT client started");

    let mut identity = identity::compose(&probe, None, &cfg.device.instance_id, &cfg.device.host);
    mqtt::announce(&mqtt_client, &cfg, &descriptors, &identity).await?;
    mqtt::publish_availability(&mqtt_client, &cfg, false).await?;

    let mut poller = Poller::new(client, descriptors, Local::now().date_naive());

    let mut ticker = tokio::time::interval(Duration::from_secs(cfg.device.poll_interval_secs));
    // A fetch that overruns the interval must not cause catch-up bursts.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let sig = tokio::signal::ctrl_c();
    tokio::pin!(sig);
    loop {
        tokio::select! {
            biased;
            _ = &mut sig => {
                info!("shutdown requested");
                break;
            }
            _ = ticker.tick() => {
                match poller.refresh().await {
                    Ok(()) => {
                        let today = Local::now().date_naive();
                        let values = poller.project(today);

                        let current = identity::compose(
                            &probe,
                            poller.snapshot(),
                            &cfg.device.instance_id,
                            &cfg.device.host,
                        );
                        if current != identity {
                            info!("device identity changed, republishing discovery");
                            if let Err(e) =
                                mqtt::announce(&mqtt_client, &cfg, poller.descriptors(), &current).await
                            {
                                error!("failed to republish discovery: {}", e);
                            } else {
                                identity = current;
                            }
                        }

                        if let Err(e) = mqtt::publish_availability(&mqtt_client, &cfg, true).await {
                            error!("failed to publish availability: {}", e);
                        }
                        if let Err(e) =
                            mqtt::publish_states(&mqtt_client, &cfg, poller.descriptors(), &values).await
                        {
                            error!("failed to publish states: {}", e);
                        }
                    }
                    Err(e) => {
                        // Readings stay at their last published values; only
                        // availability flips.
                        error!("device update failed: {}", e);
                        if let Err(e) = mqtt::publish_availability(&mqtt_client, &cfg, false).await {
                            error!("failed to publish availability: {}", e);
                        }
                    }
                }
            }
        }
    }

    if let Err(e) = mqtt::publish_availability(&mqtt_client, &cfg, false).await {
        warn!("failed to publish offline state on shutdown: {}", e);
    }
    info!("shutdown complete");
    Ok(())
}
