use airport_core::repository::Repository;
use airport_core::{
    Airline, Airport, Booking, Employee, FlightStatus, Gate, Passenger, RecordService,
};
use airport_store::{app_config::Config, DbClient, PgTable};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

async fn count<T: PgTable>(db: &DbClient) -> anyhow::Result<usize> {
    Ok(db.repository::<T>().find_all().await?.len())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "airport_store=debug,airport_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!("Connecting to database ({} max connections)", config.database.max_connections);

    let db = DbClient::new(&config.database).await?;
    db.migrate().await?;

    tracing::info!("airline: {} row(s)", count::<Airline>(&db).await?);
    tracing::info!("airport: {} row(s)", count::<Airport>(&db).await?);
    tracing::info!("booking: {} row(s)", count::<Booking>(&db).await?);
    tracing::info!("employee: {} row(s)", count::<Employee>(&db).await?);
    tracing::info!("flight_status: {} row(s)", count::<FlightStatus>(&db).await?);
    tracing::info!("gate: {} row(s)", count::<Gate>(&db).await?);

    let passengers = RecordService::new(db.repository::<Passenger>())
        .with_max_key_attempts(config.identity.max_key_attempts);
    match passengers.latest::<Passenger>().await? {
        Some(latest) => tracing::info!("passenger: latest code {:?}", latest.passenger_id),
        None => tracing::info!("passenger: empty"),
    }

    Ok(())
}
