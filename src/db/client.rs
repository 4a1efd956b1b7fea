use bson::doc;
use mongodb::options::ClientOptions;
use mongodb::{Client, Database};

const APP_NAME: &str = "pr-review-server";

pub struct MongoClient {
    db: Database,
}

impl MongoClient {
    /// Connects and pings the server.
    pub async fn connect(url: &str, db_name: &str) -> Result<Self, mongodb::error::Error> {
        let mut options = ClientOptions::parse(url).await?;
        options.app_name = Some(APP_NAME.to_string());

        let client = Client::with_options(options)?;
        let db = client.database(db_name);
        db.run_command(doc! { "ping": 1 }).await?;

        tracing::info!("Connected to MongoDB database {}", db_name);
        Ok(Self { db })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}
