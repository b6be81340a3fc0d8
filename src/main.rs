use keyspace_client::Action;
use keyspace_client::Client;
use keyspace_client::ClientConfig;
use keyspace_client::Error;
use keyspace_client::Response;
use keyspace_client::Result;
use keyspace_client::StoreErrorCode;
use keyspace_client::WatchOutcome;
use tracing::error;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

const DEFAULT_SCRATCH_DIR: &str = "/keyspace-smoke";

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    init_observability();

    let config = ClientConfig::new()?.validate()?;
    let scratch = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_SCRATCH_DIR.to_string());

    let client = Client::builder(config.endpoints.clone())
        .set_config(config)
        .build()?;

    info!(scratch = %scratch, "running smoke scenario");
    tokio::select! {
        result = run_scenario(&client, &scratch) => {
            if let Err(e) = &result {
                error!("smoke scenario failed: {}", e);
            }
            result
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected, cancelled {} watches", client.cancel_operations());
            Err(Error::Fatal("interrupted".to_string()))
        }
    }
}

fn init_observability() {
    let base_subscriber = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));
    tracing_subscriber::registry().with(base_subscriber).init();
}

async fn run_scenario(
    client: &Client,
    scratch: &str,
) -> Result<()> {
    let key = format!("{scratch}/key1");

    // leftovers of a previous run
    let cleanup = client.rmdir(scratch, true).await?;
    if !cleanup.is_ok() && cleanup.error_kind() != Some(StoreErrorCode::KeyNotFound) {
        return Err(mismatch("cleanup", "0 or 100", &cleanup));
    }

    let created = client.add(&key, "42").await?;
    expect_code("add", &created, 0)?;
    info!(index = created.index(), "add {} = 42", key);

    let duplicate = client.add(&key, "42").await?;
    expect_code("add again", &duplicate, StoreErrorCode::NodeExists.code())?;

    let read = client.get(&key).await?;
    expect_code("get", &read, 0)?;
    if read.value().as_string() != "42" {
        return Err(mismatch("get", "value 42", &read));
    }

    let modified = client.modify(&key, "43").await?;
    expect_code("modify", &modified, 0)?;

    let stale = client.modify_if(&key, "44", "42").await?;
    expect_code("modify_if with stale value", &stale, StoreErrorCode::TestFailed.code())?;

    let swapped = client.modify_if(&key, "44", modified.index()).await?;
    expect_code("modify_if with current index", &swapped, 0)?;

    let watch = client.watch(&key, Some(swapped.index() + 1), false)?;
    client.set(&key, "45").await?;
    match watch.await {
        WatchOutcome::Delivered(event) if *event.action() == Action::Set => {
            info!(index = event.index(), "watch delivered {}", event.value().as_string());
        }
        other => {
            return Err(Error::Fatal(format!(
                "watch: expected a delivered set, got {other:?}"
            )))
        }
    }

    let lease = client.leasegrant(30).await?;
    expect_code("leasegrant", &lease, 0)?;
    if let Some(lease_id) = lease.value().lease() {
        let leased = client
            .add_with_lease(format!("{scratch}/ephemeral"), "bye", lease_id)
            .await?;
        expect_code("add_with_lease", &leased, 0)?;
        info!(lease = lease_id, "{} bound to lease", leased.value().key());
    }

    let listing = client.ls(scratch).await?;
    expect_code("ls", &listing, 0)?;
    info!("ls {} -> {:?}", scratch, listing.keys());

    let refused = client.rmdir(scratch, false).await?;
    expect_code("rmdir", &refused, StoreErrorCode::DirectoryNotEmpty.code())?;

    let removed = client.rmdir(scratch, true).await?;
    expect_code("rmdir recursive", &removed, 0)?;

    let empty = client.ls(scratch).await?;
    if !empty.values().is_empty() {
        return Err(mismatch("ls after rmdir", "empty listing", &empty));
    }

    info!("smoke scenario passed");
    Ok(())
}

fn expect_code(
    step: &str,
    response: &Response,
    code: u32,
) -> Result<()> {
    if response.error_code() != code {
        return Err(mismatch(step, &format!("error_code {code}"), response));
    }
    Ok(())
}

fn mismatch(
    step: &str,
    expected: &str,
    response: &Response,
) -> Error {
    Error::Fatal(format!(
        "{step}: expected {expected}, got error_code {} ({}) action {}",
        response.error_code(),
        response.error_message(),
        response.action()
    ))
}
