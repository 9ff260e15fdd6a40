//! Stream selector: routes each record to every lane whose predicate
//! evaluates true, and to the default lane when none matched.

use edgetide_sdk::{Batch, BatchMaker, Processor, Stage, StageContext, StageError};
use edgetide_types::ConfigValue;

pub const STAGE_NAME: &str = "stream-selector";

const CONF_LANE_PREDICATES: &str = "lanePredicates";
const KEY_OUTPUT_LANE: &str = "outputLane";
const KEY_PREDICATE: &str = "predicate";
const DEFAULT_PREDICATE: &str = "default";

#[derive(Default)]
pub struct SelectorProcessor {
    /// `(predicate, output lane)` pairs in configuration order; the last
    /// entry is the default.
    lane_predicates: Vec<(String, String)>,
    default_lane: String,
}

impl SelectorProcessor {
    fn parse_predicate_lanes(
        ctx: &StageContext,
    ) -> Result<Vec<(String, String)>, StageError> {
        let value = ctx.config(CONF_LANE_PREDICATES).ok_or_else(|| {
            StageError::config(format!(
                "stage '{}' is missing required configuration '{CONF_LANE_PREDICATES}'",
                ctx.instance_name()
            ))
        })?;
        let entries = value.as_list().ok_or_else(|| {
            StageError::config(format!(
                "stage '{}' configuration '{CONF_LANE_PREDICATES}' expects a list, got {}",
                ctx.instance_name(),
                value.type_name()
            ))
        })?;

        let mut pairs = Vec::with_capacity(entries.len());
        for entry in entries {
            let map = entry.as_map().ok_or_else(|| {
                StageError::config(format!(
                    "stage '{}' '{CONF_LANE_PREDICATES}' entries must be maps",
                    ctx.instance_name()
                ))
            })?;
            let lane = map
                .get(KEY_OUTPUT_LANE)
                .and_then(ConfigValue::as_str)
                .unwrap_or_default()
                .to_string();
            let predicate = map
                .get(KEY_PREDICATE)
                .and_then(ConfigValue::as_str)
                .unwrap_or_default()
                .to_string();
            if !ctx.output_lanes().contains(&lane) {
                return Err(StageError::config(format!(
                    "The Stream Selector does not define the output stream '{lane}' \
                     associated with condition '{predicate}'"
                )));
            }
            pairs.push((predicate, lane));
        }
        Ok(pairs)
    }
}

impl Stage for SelectorProcessor {
    fn init(&mut self, ctx: &mut StageContext) -> Result<(), StageError> {
        self.lane_predicates = Self::parse_predicate_lanes(ctx)?;

        match self.lane_predicates.last() {
            Some((predicate, lane)) if predicate == DEFAULT_PREDICATE => {
                self.default_lane = lane.clone();
            }
            _ => {
                return Err(StageError::config(
                    "The last condition must be 'default'".to_string(),
                ))
            }
        }
        Ok(())
    }
}

impl Processor for SelectorProcessor {
    fn process(
        &mut self,
        ctx: &mut StageContext,
        batch: &Batch,
        maker: &mut BatchMaker,
    ) -> Result<(), StageError> {
        'records: for record in batch.records() {
            let mut matched = false;
            for (predicate, lane) in &self.lane_predicates {
                if lane == &self.default_lane {
                    continue;
                }
                let verdict =
                    match ctx.evaluate(predicate, KEY_PREDICATE, Some(record)) {
                        Ok(serde_json::Value::Bool(verdict)) => verdict,
                        Ok(other) => {
                            ctx.to_error(
                                format!(
                                    "condition '{predicate}' did not evaluate to a boolean \
                                     (got {other})"
                                ),
                                record.clone(),
                            );
                            continue 'records;
                        }
                        Err(err) => {
                            ctx.to_error(err, record.clone());
                            continue 'records;
                        }
                    };
                if verdict {
                    matched = true;
                    maker.add_record(record.clone(), Some(lane.as_str()))?;
                }
            }
            if !matched {
                maker.add_record(record.clone(), Some(self.default_lane.as_str()))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};

    use edgetide_types::{Field, Record};

    use super::*;

    fn predicate_entry(predicate: &str, lane: &str) -> ConfigValue {
        ConfigValue::Map(BTreeMap::from([
            (
                KEY_PREDICATE.to_string(),
                ConfigValue::String(predicate.to_string()),
            ),
            (
                KEY_OUTPUT_LANE.to_string(),
                ConfigValue::String(lane.to_string()),
            ),
        ]))
    }

    fn selector_context(entries: Vec<ConfigValue>, lanes: Vec<&str>) -> StageContext {
        StageContext::builder()
            .instance_name("selector-1")
            .output_lanes(lanes.into_iter().map(str::to_string).collect())
            .configs(HashMap::from([(
                CONF_LANE_PREDICATES.to_string(),
                ConfigValue::List(entries),
            )]))
            .build()
    }

    fn record_with_value(n: i64) -> Record {
        Record::new("o", format!("src::{n}"), Field::map([("value", Field::Integer(n))]))
    }

    #[test]
    fn routes_to_matching_lanes_and_default_otherwise() {
        let mut ctx = selector_context(
            vec![
                predicate_entry("${record:exists('/value')}", "laneA"),
                predicate_entry("${record:exists('/other')}", "laneB"),
                predicate_entry(DEFAULT_PREDICATE, "laneC"),
            ],
            vec!["laneA", "laneB", "laneC"],
        );
        let mut selector = SelectorProcessor::default();
        selector.init(&mut ctx).unwrap();

        let mut with_other = record_with_value(2);
        with_other
            .set_field("/other", Field::Boolean(true))
            .unwrap();
        let no_fields = Record::new("o", "src::3", Field::map::<&str, _>([]));

        let batch = Batch::new(
            vec![record_with_value(1), with_other, no_fields],
            Some("3".to_string()),
        );
        let mut maker = BatchMaker::new(vec![
            "laneA".to_string(),
            "laneB".to_string(),
            "laneC".to_string(),
        ]);
        selector.process(&mut ctx, &batch, &mut maker).unwrap();

        let lanes = maker.into_lanes();
        // record 1: /value only -> laneA; record 2: both -> laneA + laneB;
        // record 3: neither -> default laneC
        assert_eq!(lanes["laneA"].len(), 2);
        assert_eq!(lanes["laneB"].len(), 1);
        assert_eq!(lanes["laneC"].len(), 1);
        assert_eq!(lanes["laneB"][0].header().source_id, "src::2");
        assert_eq!(lanes["laneC"][0].header().source_id, "src::3");
    }

    #[test]
    fn fan_out_clones_are_independent() {
        let mut ctx = selector_context(
            vec![
                predicate_entry("${record:exists('/value')}", "laneA"),
                predicate_entry("${record:exists('/value')}", "laneB"),
                predicate_entry(DEFAULT_PREDICATE, "laneC"),
            ],
            vec!["laneA", "laneB", "laneC"],
        );
        let mut selector = SelectorProcessor::default();
        selector.init(&mut ctx).unwrap();

        let batch = Batch::new(vec![record_with_value(1)], None);
        let mut maker = BatchMaker::new(vec![
            "laneA".to_string(),
            "laneB".to_string(),
            "laneC".to_string(),
        ]);
        selector.process(&mut ctx, &batch, &mut maker).unwrap();

        let mut lanes = maker.into_lanes();
        let mut a = lanes.remove("laneA").unwrap();
        let b = lanes.remove("laneB").unwrap();
        a[0].set_field("/value", Field::Integer(99)).unwrap();
        assert_eq!(b[0].get("/value").unwrap().unwrap(), &Field::Integer(1));
    }

    #[test]
    fn undefined_output_stream_is_a_configuration_error() {
        let mut ctx = selector_context(
            vec![
                predicate_entry("${record:exists('/value')}", "laneX"),
                predicate_entry(DEFAULT_PREDICATE, "laneC"),
            ],
            vec!["laneA", "laneC"],
        );
        let err = SelectorProcessor::default().init(&mut ctx).unwrap_err();
        assert_eq!(
            err.to_string(),
            "configuration error: The Stream Selector does not define the output stream \
             'laneX' associated with condition '${record:exists('/value')}'"
        );
    }

    #[test]
    fn last_condition_must_be_default() {
        let mut ctx = selector_context(
            vec![
                predicate_entry(DEFAULT_PREDICATE, "laneC"),
                predicate_entry("${record:exists('/value')}", "laneA"),
            ],
            vec!["laneA", "laneC"],
        );
        let err = SelectorProcessor::default().init(&mut ctx).unwrap_err();
        assert_eq!(
            err.to_string(),
            "configuration error: The last condition must be 'default'"
        );
    }

    #[test]
    fn evaluation_failure_redirects_the_record() {
        let mut ctx = selector_context(
            vec![
                predicate_entry("${record:value('/missing/intermediate')}", "laneA"),
                predicate_entry(DEFAULT_PREDICATE, "laneC"),
            ],
            vec!["laneA", "laneC"],
        );
        let mut selector = SelectorProcessor::default();
        selector.init(&mut ctx).unwrap();

        let batch = Batch::new(vec![record_with_value(1)], None);
        let mut maker = BatchMaker::new(vec!["laneA".to_string(), "laneC".to_string()]);
        selector.process(&mut ctx, &batch, &mut maker).unwrap();

        // not routed anywhere, redirected to the error sink instead
        assert_eq!(maker.total_records(), 0);
        let sink = ctx.error_sink().lock().unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(
            sink[0].header().error_message.as_deref(),
            Some("invalid fieldPath '/missing/intermediate'")
        );
    }
}
