use crate::config::Config;
use crate::errors::{DataHubError, Result};
use crate::models::eod::HistoricalRecord;
use crate::store::base::{RecordStore, WriteSummary};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use futures::TryStreamExt;
use log::{debug, info};
use mongodb::bson::{self, doc, Bson, Document};
use mongodb::error::ErrorKind;
use mongodb::options::{IndexOptions, InsertManyOptions};
use mongodb::{Client, Collection, Database, IndexModel};

const DUPLICATE_KEY: i32 = 11000;
const VOLUME_FIELDS: [&str; 2] = ["volume", "unadjustedVolume"];

/// End-of-day records in a MongoDB collection with a unique `(symbol, date)` index.
pub struct MongoStore {
    database: Database,
    collection: String,
}

impl MongoStore {
    /// Connect to `uri` and bind to `database.collection`. Nothing is created
    /// until `ensure_schema` runs.
    pub async fn connect(uri: &str, database: &str, collection: &str) -> Result<Self> {
        if uri.trim().is_empty() {
            return Err(DataHubError::ConfigurationError(
                "MONGODB_URI environment variable not set".to_string(),
            ));
        }
        let client = Client::with_uri_str(uri).await?;
        Ok(Self {
            database: client.database(database),
            collection: collection.to_string(),
        })
    }

    /// Connect using the MongoDB settings in `config`.
    pub async fn from_config(config: &Config) -> Result<Self> {
        Self::connect(&config.mongodb_uri, &config.database, &config.collection).await
    }

    fn collection(&self) -> Collection<Document> {
        self.database.collection(&self.collection)
    }
}

#[async_trait]
impl RecordStore for MongoStore {
    async fn ensure_schema(&self) -> Result<()> {
        let existing = self.database.list_collection_names(None).await?;
        if existing.iter().any(|name| name == &self.collection) {
            info!("{} collection already exists", self.collection);
        } else {
            info!("{} collection not found, creating it", self.collection);
            self.database.create_collection(&self.collection, None).await?;
        }

        // createIndex is a no-op when an identical index exists.
        let index = IndexModel::builder()
            .keys(doc! { "symbol": 1, "date": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.collection().create_index(index, None).await?;
        Ok(())
    }

    async fn write_batch(&self, records: &[HistoricalRecord]) -> Result<WriteSummary> {
        if records.is_empty() {
            return Ok(WriteSummary::default());
        }

        let documents = records
            .iter()
            .map(to_document)
            .collect::<Result<Vec<_>>>()?;
        let options = InsertManyOptions::builder().ordered(false).build();

        match self.collection().insert_many(documents, options).await {
            Ok(result) => Ok(WriteSummary {
                inserted: result.inserted_ids.len(),
                duplicates: 0,
            }),
            Err(e) => {
                let duplicates = match e.kind.as_ref() {
                    ErrorKind::BulkWrite(failure) => {
                        let codes: Vec<i32> = failure
                            .write_errors
                            .as_deref()
                            .unwrap_or_default()
                            .iter()
                            .map(|w| w.code)
                            .collect();
                        duplicate_count(&codes, failure.write_concern_error.is_some())
                    }
                    _ => None,
                };

                match duplicates {
                    Some(duplicates) => {
                        debug!("Skipped {} duplicate rows", duplicates);
                        Ok(WriteSummary {
                            inserted: records.len().saturating_sub(duplicates),
                            duplicates,
                        })
                    }
                    None => Err(DataHubError::PersistenceError(e)),
                }
            }
        }
    }

    async fn read_all(&self) -> Result<Vec<HistoricalRecord>> {
        let mut cursor = self.collection().find(None, None).await?;
        let mut records = Vec::new();
        while let Some(document) = cursor.try_next().await? {
            records.push(from_document(document)?);
        }
        Ok(records)
    }
}

/// Number of rows an unordered bulk insert skipped as duplicates, or `None` when
/// the failure has to be reported. Only a batch whose every write error is a
/// duplicate key, with no write concern error, counts as success.
fn duplicate_count(codes: &[i32], write_concern_failed: bool) -> Option<usize> {
    if write_concern_failed || codes.is_empty() {
        return None;
    }
    codes.iter().all(|&code| code == DUPLICATE_KEY).then_some(codes.len())
}

/// Dates are stored as BSON datetimes at UTC midnight.
fn to_document(record: &HistoricalRecord) -> Result<Document> {
    let mut document = bson::to_document(record)?;
    let midnight = record
        .date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| DataHubError::DataError(format!("Invalid date {}", record.date)))?
        .and_utc();
    document.insert("date", bson::DateTime::from_millis(midnight.timestamp_millis()));
    Ok(document)
}

fn from_document(mut document: Document) -> Result<HistoricalRecord> {
    document.remove("_id");
    let date = match document.get("date") {
        Some(Bson::DateTime(dt)) => millis_to_date(dt.timestamp_millis())?,
        Some(Bson::String(s)) => NaiveDate::parse_from_str(s, "%Y-%m-%d")?,
        other => {
            return Err(DataHubError::DataError(format!(
                "Unexpected date value in stored record: {:?}",
                other
            )))
        }
    };
    document.insert("date", date.format("%Y-%m-%d").to_string());
    for field in VOLUME_FIELDS {
        normalize_volume(&mut document, field)?;
    }
    Ok(bson::from_document(document)?)
}

/// Volumes written by other tools may be stored as doubles or 32-bit ints.
fn normalize_volume(document: &mut Document, field: &str) -> Result<()> {
    let volume = match document.get(field) {
        Some(Bson::Int32(v)) => i64::from(*v),
        Some(Bson::Double(v)) if v.is_finite() => v.round() as i64,
        Some(Bson::Double(v)) => {
            return Err(DataHubError::DataError(format!("Invalid {} in stored record: {}", field, v)))
        }
        _ => return Ok(()),
    };
    document.insert(field, Bson::Int64(volume));
    Ok(())
}

fn millis_to_date(millis: i64) -> Result<NaiveDate> {
    DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.date_naive())
        .ok_or_else(|| DataHubError::DataError(format!("Timestamp out of range: {}", millis)))
}
