#[cfg(test)]
mod tests {
    use crate::api::collect_posts;
    use crate::types::{
        coerce_count, InstagramCommentItem, InstagramCommentScraperInput, InstagramPostItem,
        InstagramPostScraperInput, RunData, RunStatus,
    };
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn test_post_scraper_input_shape() {
        let input = InstagramPostScraperInput {
            username: vec!["natgeo".to_string()],
            results_limit: 30,
        };
        assert_eq!(
            serde_json::to_value(&input).unwrap(),
            json!({"username": ["natgeo"], "resultsLimit": 30})
        );
    }

    #[test]
    fn test_comment_scraper_input_shape() {
        let input = InstagramCommentScraperInput {
            direct_urls: vec!["https://www.instagram.com/p/Cx1/".to_string()],
            results_limit: 15,
        };
        assert_eq!(
            serde_json::to_value(&input).unwrap(),
            json!({"directUrls": ["https://www.instagram.com/p/Cx1/"], "resultsLimit": 15})
        );
    }

    #[test]
    fn test_run_status_parsing() {
        let run: RunData = serde_json::from_value(json!({
            "id": "run1",
            "status": "RUNNING",
            "defaultDatasetId": "ds1",
            "startedAt": "2024-03-01T10:00:00.000Z",
            "finishedAt": null
        }))
        .unwrap();
        assert_eq!(run.run_status(), RunStatus::InProgress);
        assert_eq!(run.default_dataset_id, "ds1");

        for status in ["FAILED", "ABORTED", "TIMED-OUT"] {
            let run = RunData {
                status: status.to_string(),
                ..run.clone()
            };
            assert_eq!(run.run_status(), RunStatus::Failed);
        }
    }

    #[test]
    fn test_post_item_counts_are_coerced() {
        let items: Vec<InstagramPostItem> = serde_json::from_value(json!([
            {"url": "https://www.instagram.com/p/A/", "likesCount": 120, "commentsCount": "14"},
            {"url": "https://www.instagram.com/p/B/", "likesCount": "n/a", "commentsCount": null},
            {"url": "https://www.instagram.com/p/C/"},
            {"likesCount": 3, "commentsCount": 1},
            {"url": "https://www.instagram.com/p/A/", "likesCount": 1, "commentsCount": 1}
        ]))
        .unwrap();

        let posts = collect_posts(items);
        assert_eq!(posts.len(), 3);

        assert_eq!(posts[0].likes_count, Some(120));
        assert_eq!(posts[0].comments_count, Some(14));
        assert_eq!(posts[1].likes_count, None);
        assert_eq!(posts[1].comments_count, None);
        // Missing counters default to zero.
        assert_eq!(posts[2].likes_count, Some(0));
        assert_eq!(posts[2].comments_count, Some(0));
    }

    #[test]
    fn test_comment_items_without_text_are_dropped() {
        let items: Vec<InstagramCommentItem> = serde_json::from_value(json!([
            {"text": "great!", "likesCount": 3, "repliesCount": 0, "timestamp": "2024-03-01T10:00:00.000Z"},
            {"likesCount": 9},
            {"text": "bad", "likesCount": -2, "repliesCount": 1.0, "timestamp": "yesterday"},
            {"text": "ok", "timestamp": 1709287200}
        ]))
        .unwrap();

        let comments: Vec<_> = items
            .into_iter()
            .filter_map(|item| item.into_comment("https://www.instagram.com/p/A/"))
            .collect();
        assert_eq!(comments.len(), 3);

        assert_eq!(comments[0].comment_text, "great!");
        assert_eq!(comments[0].post_url, "https://www.instagram.com/p/A/");
        assert_eq!(
            comments[0].timestamp,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap())
        );

        assert_eq!(comments[1].likes_count, None);
        assert_eq!(comments[1].replies_count, Some(1));
        assert_eq!(comments[1].timestamp, None);

        assert_eq!(comments[2].likes_count, Some(0));
        assert_eq!(
            comments[2].timestamp,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_count_coercion() {
        assert_eq!(coerce_count(&json!(7)), Some(7));
        assert_eq!(coerce_count(&json!(" 42 ")), Some(42));
        assert_eq!(coerce_count(&json!(3.0)), Some(3));
        assert_eq!(coerce_count(&json!(3.5)), None);
        assert_eq!(coerce_count(&json!(-1)), None);
        assert_eq!(coerce_count(&json!(true)), None);
        assert_eq!(coerce_count(&json!(null)), None);
    }

    #[test]
    fn test_client_builds_from_config() {
        let config = instasense_core::ApifyConfig {
            api_token: Some("apify_api_test".to_string()),
            post_results_limit: 5,
            comment_results_limit: 2,
            ..Default::default()
        };
        let client = crate::ApifyClient::from_config(&config)
            .unwrap()
            .with_base_url("http://localhost:8080/v2/");
        assert_eq!(client.post_results_limit(), 5);
        assert_eq!(client.comment_results_limit(), 2);
    }

    #[test]
    fn test_invalid_post_url_is_rejected() {
        let client = crate::ApifyClient::new("apify_api_test".to_string()).unwrap();
        let result = tokio_test::block_on(client.scrape_comments("instagram/p/A"));
        assert!(matches!(
            result,
            Err(instasense_core::CoreError::InvalidInput { .. })
        ));
    }
}
