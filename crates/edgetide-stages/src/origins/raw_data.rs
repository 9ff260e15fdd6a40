//! Development origin producing records from inline text data.
//!
//! Splits the configured `rawData` string into lines and produces one
//! record per line, a root map with the line under key `text`. The
//! offset is the next unread line index, so a restarted pipeline resumes
//! mid-data.

use edgetide_sdk::{BatchMaker, Origin, Stage, StageContext, StageError};
use edgetide_types::Field;

pub const STAGE_NAME: &str = "dev-raw-data-origin";

const CONF_RAW_DATA: &str = "rawData";
const CONF_DATA_FORMAT: &str = "dataFormat";
const CONF_STOP_AFTER_FIRST_BATCH: &str = "stopAfterFirstBatch";

#[derive(Default)]
pub struct RawDataOrigin {
    lines: Vec<String>,
    stop_after_first_batch: bool,
}

impl Stage for RawDataOrigin {
    fn init(&mut self, ctx: &mut StageContext) -> Result<(), StageError> {
        let raw = ctx.required_string_config(CONF_RAW_DATA)?;
        // the raw data itself may be an expression over constants
        let raw = match ctx.evaluate(&raw, CONF_RAW_DATA, None)? {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        self.lines = raw.lines().map(str::to_string).collect();

        if let Some(format) = ctx.config(CONF_DATA_FORMAT) {
            let format = format.as_str().ok_or_else(|| {
                StageError::config(format!(
                    "stage '{}' configuration '{CONF_DATA_FORMAT}' expects a string",
                    ctx.instance_name()
                ))
            })?;
            if format != "TEXT" {
                return Err(StageError::config(format!(
                    "stage '{}' does not support data format '{format}'",
                    ctx.instance_name()
                )));
            }
        }
        self.stop_after_first_batch = ctx
            .config(CONF_STOP_AFTER_FIRST_BATCH)
            .and_then(edgetide_types::ConfigValue::as_bool)
            .unwrap_or(false);

        tracing::debug!(
            stage = ctx.instance_name(),
            lines = self.lines.len(),
            "Raw data origin ready"
        );
        Ok(())
    }
}

impl Origin for RawDataOrigin {
    fn produce(
        &mut self,
        ctx: &mut StageContext,
        last_offset: Option<&str>,
        max_batch_size: usize,
        maker: &mut BatchMaker,
    ) -> Result<Option<String>, StageError> {
        let start = match last_offset {
            Some(offset) => offset.parse::<usize>().map_err(|_| {
                StageError::Runtime(format!("unparseable source offset '{offset}'"))
            })?,
            None => 0,
        };
        if start >= self.lines.len() {
            return Ok(None);
        }

        let end = self.lines.len().min(start + max_batch_size.max(1));
        for (index, line) in self.lines[start..end].iter().enumerate() {
            let record = ctx.create_record(
                &format!("rawData::{}", start + index),
                Field::map([("text", Field::string(line.clone()))]),
            );
            maker.add_record(record, None)?;
        }

        if self.stop_after_first_batch || end >= self.lines.len() {
            Ok(None)
        } else {
            Ok(Some(end.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use edgetide_types::ConfigValue;

    use super::*;

    fn context(raw_data: &str) -> StageContext {
        StageContext::builder()
            .instance_name("origin-1")
            .output_lanes(vec!["lane1".to_string()])
            .configs(HashMap::from([(
                CONF_RAW_DATA.to_string(),
                ConfigValue::String(raw_data.to_string()),
            )]))
            .build()
    }

    #[test]
    fn produces_one_record_per_line_with_text_key() {
        let mut ctx = context("test data 1\ntest data 2\ntest data 3");
        let mut origin = RawDataOrigin::default();
        origin.init(&mut ctx).unwrap();

        let mut maker = BatchMaker::new(vec!["lane1".to_string()]);
        let offset = origin.produce(&mut ctx, None, 1000, &mut maker).unwrap();
        assert_eq!(offset, None, "all data consumed in one batch");

        let lanes = maker.into_lanes();
        let records = &lanes["lane1"];
        assert_eq!(records.len(), 3);
        for (i, record) in records.iter().enumerate() {
            let root = record.root().unwrap();
            assert_eq!(root.type_name(), "MAP");
            let text = record.get("/text").unwrap().unwrap();
            assert_eq!(text.as_str(), Some(format!("test data {}", i + 1).as_str()));
        }

        // a further produce call reports end-of-data with no records
        let mut maker = BatchMaker::new(vec!["lane1".to_string()]);
        let offset = origin.produce(&mut ctx, Some("3"), 1000, &mut maker).unwrap();
        assert_eq!(offset, None);
        assert_eq!(maker.total_records(), 0);
    }

    #[test]
    fn honors_max_batch_size_and_resumes_from_offset() {
        let mut ctx = context("l0\nl1\nl2\nl3\nl4");
        let mut origin = RawDataOrigin::default();
        origin.init(&mut ctx).unwrap();

        let mut maker = BatchMaker::new(vec!["lane1".to_string()]);
        let offset = origin.produce(&mut ctx, None, 2, &mut maker).unwrap();
        assert_eq!(offset.as_deref(), Some("2"));
        assert_eq!(maker.total_records(), 2);

        let mut maker = BatchMaker::new(vec!["lane1".to_string()]);
        let offset = origin
            .produce(&mut ctx, offset.as_deref(), 2, &mut maker)
            .unwrap();
        assert_eq!(offset.as_deref(), Some("4"));
        let lanes = maker.into_lanes();
        assert_eq!(lanes["lane1"][0].get("/text").unwrap().unwrap().as_str(), Some("l2"));
    }

    #[test]
    fn missing_raw_data_fails_init() {
        let mut ctx = StageContext::builder()
            .instance_name("origin-1")
            .output_lanes(vec!["lane1".to_string()])
            .build();
        let err = RawDataOrigin::default().init(&mut ctx).unwrap_err();
        assert!(err.to_string().contains("rawData"));
    }

    #[test]
    fn unsupported_data_format_fails_init() {
        let mut ctx = StageContext::builder()
            .instance_name("origin-1")
            .output_lanes(vec!["lane1".to_string()])
            .configs(HashMap::from([
                (
                    CONF_RAW_DATA.to_string(),
                    ConfigValue::String("x".to_string()),
                ),
                (
                    CONF_DATA_FORMAT.to_string(),
                    ConfigValue::String("JSON".to_string()),
                ),
            ]))
            .build();
        let err = RawDataOrigin::default().init(&mut ctx).unwrap_err();
        assert!(err.to_string().contains("does not support data format 'JSON'"));
    }

    #[test]
    fn stop_after_first_batch_ends_the_data_early() {
        let mut ctx = StageContext::builder()
            .instance_name("origin-1")
            .output_lanes(vec!["lane1".to_string()])
            .configs(HashMap::from([
                (
                    CONF_RAW_DATA.to_string(),
                    ConfigValue::String("a\nb\nc".to_string()),
                ),
                (CONF_STOP_AFTER_FIRST_BATCH.to_string(), ConfigValue::Bool(true)),
            ]))
            .build();
        let mut origin = RawDataOrigin::default();
        origin.init(&mut ctx).unwrap();
        let mut maker = BatchMaker::new(vec!["lane1".to_string()]);
        let offset = origin.produce(&mut ctx, None, 1, &mut maker).unwrap();
        assert_eq!(offset, None);
        assert_eq!(maker.total_records(), 1);
    }
}
