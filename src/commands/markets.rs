use anyhow::Result;
use serde_json::{Map, Value};
use tracing::debug;

use crate::cli::MarketsArgs;
use crate::clob::{Exchange, INITIAL_CURSOR};

/// Page size used when `--with-title` is given without `--limit`
pub const TITLE_LOOKUP_LIMIT: usize = 20;

pub async fn markets(exchange: &dyn Exchange, args: &MarketsArgs) -> Result<Value> {
    if let Some(id) = &args.id {
        return exchange.get_market(id).await;
    }

    let limit = match args.limit {
        None if args.with_title => Some(TITLE_LOOKUP_LIMIT),
        limit => limit.filter(|l| *l > 0),
    };

    let mut page = if args.sampling {
        let cursor = args
            .cursor
            .clone()
            .unwrap_or_else(|| INITIAL_CURSOR.to_string());
        exchange.get_sampling_simplified_markets(Some(cursor)).await?
    } else {
        exchange.get_simplified_markets(args.cursor.clone()).await?
    };

    if args.accepting_only {
        page.data.retain(|market| {
            market
                .get("accepting_orders")
                .and_then(Value::as_bool)
                .unwrap_or(false)
        });
    }
    if let Some(limit) = limit {
        page.data.truncate(limit);
    }
    if args.with_title {
        for market in page.data.iter_mut() {
            attach_title(exchange, market).await;
        }
    }

    Ok(serde_json::to_value(page)?)
}

/// Look up the market's title by `condition_id`; a failed lookup leaves `title: null`.
async fn attach_title(exchange: &dyn Exchange, market: &mut Map<String, Value>) {
    let condition_id = match market.get("condition_id").and_then(Value::as_str) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => return,
    };

    let title = match exchange.get_market(&condition_id).await {
        Ok(detail) => ["question", "name", "title"]
            .iter()
            .filter_map(|key| detail.get(*key).and_then(Value::as_str))
            .find(|s| !s.is_empty())
            .map(|s| Value::String(s.to_string()))
            .unwrap_or(Value::Null),
        Err(e) => {
            debug!(condition_id = %condition_id, error = %e, "Title lookup failed");
            Value::Null
        }
    };
    market.insert("title".to_string(), title);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clob::{MarketsPage, MockExchange};
    use anyhow::anyhow;
    use mockall::predicate::eq;
    use serde_json::json;

    fn page(markets: Vec<Value>) -> MarketsPage {
        MarketsPage {
            data: markets
                .into_iter()
                .map(|m| m.as_object().cloned().unwrap())
                .collect(),
            next_cursor: Some("LTE=".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn id_fetches_single_market() {
        let mut exchange = MockExchange::new();
        exchange
            .expect_get_market()
            .with(eq("0xcond"))
            .returning(|_| Ok(json!({"question": "Will it rain?"})));

        let args = MarketsArgs {
            id: Some("0xcond".to_string()),
            ..Default::default()
        };
        let out = markets(&exchange, &args).await.unwrap();
        assert_eq!(out["question"], "Will it rain?");
    }

    #[tokio::test]
    async fn sampling_starts_from_initial_cursor() {
        let mut exchange = MockExchange::new();
        exchange
            .expect_get_sampling_simplified_markets()
            .with(eq(Some(INITIAL_CURSOR.to_string())))
            .times(1)
            .returning(|_| Ok(page(vec![])));

        let args = MarketsArgs {
            sampling: true,
            ..Default::default()
        };
        let out = markets(&exchange, &args).await.unwrap();
        assert_eq!(out["next_cursor"], "LTE=");
    }

    #[tokio::test]
    async fn accepting_only_and_limit_filter_the_page() {
        let mut exchange = MockExchange::new();
        exchange
            .expect_get_simplified_markets()
            .with(eq(None))
            .returning(|_| {
                Ok(page(vec![
                    json!({"condition_id": "a", "accepting_orders": true}),
                    json!({"condition_id": "b", "accepting_orders": false}),
                    json!({"condition_id": "c", "accepting_orders": true}),
                    json!({"condition_id": "d"}),
                    json!({"condition_id": "e", "accepting_orders": true}),
                ]))
            });

        let args = MarketsArgs {
            accepting_only: true,
            limit: Some(2),
            ..Default::default()
        };
        let out = markets(&exchange, &args).await.unwrap();
        let ids: Vec<&str> = out["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["condition_id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn with_title_defaults_limit_and_tolerates_failures() {
        let markets_list: Vec<Value> = (0..25)
            .map(|i| json!({"condition_id": format!("c{}", i)}))
            .collect();

        let mut exchange = MockExchange::new();
        exchange
            .expect_get_simplified_markets()
            .returning(move |_| Ok(page(markets_list.clone())));
        exchange
            .expect_get_market()
            .times(TITLE_LOOKUP_LIMIT)
            .returning(|id| match id {
                "c1" => Err(anyhow!("404")),
                "c2" => Ok(json!({"question": "", "name": "Named"})),
                other => Ok(json!({"question": format!("Q {}", other)})),
            });

        let args = MarketsArgs {
            with_title: true,
            ..Default::default()
        };
        let out = markets(&exchange, &args).await.unwrap();
        let data = out["data"].as_array().unwrap();
        assert_eq!(data.len(), TITLE_LOOKUP_LIMIT);
        assert_eq!(data[0]["title"], "Q c0");
        assert!(data[1]["title"].is_null());
        assert_eq!(data[2]["title"], "Named");
    }
}
