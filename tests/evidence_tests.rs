use physiocase::config::EvidenceConfig;
use physiocase::evidence::{EvidenceItem, EvidenceRetriever, LiteratureSource, PubMedClient};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> PubMedClient {
    PubMedClient::new(&server.uri(), Duration::from_secs(5)).expect("client should build")
}

async fn mount_search(server: &MockServer, ids: &[&str]) {
    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .and(query_param("db", "pubmed"))
        .and(query_param("retmode", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "header": { "type": "esearch" },
            "esearchresult": { "count": ids.len().to_string(), "idlist": ids }
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_search_sends_filtered_term_and_cap() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .and(query_param(
            "term",
            "frozen shoulder AND (systematic[sb] OR meta-analysis[pt])",
        ))
        .and(query_param("retmax", "3"))
        .and(query_param("sort", "relevance"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "esearchresult": { "idlist": ["101", "102"] }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let retriever = EvidenceRetriever::new(Arc::new(client_for(&server)))
        .with_filter("systematic[sb] OR meta-analysis[pt]");
    let term = retriever.build_term("frozen shoulder");

    let ids = client_for(&server)
        .search(&term, 3)
        .await
        .expect("search should succeed");
    assert_eq!(ids, vec!["101".to_string(), "102".to_string()]);
}

#[tokio::test]
async fn test_fetch_batches_ids_into_one_request() {
    let server = MockServer::start().await;
    mount_search(&server, &["11", "22", "33"]).await;
    Mock::given(method("GET"))
        .and(path("/esummary.fcgi"))
        .and(query_param("id", "11,22,33"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {
                "uids": ["11", "22", "33"],
                "11": { "uid": "11", "title": "Exercise therapy for adhesive capsulitis" },
                "22": { "uid": "22", "title": " Hydrodilatation versus injection " },
                "33": { "uid": "33", "title": "Manual therapy in frozen shoulder" }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let retriever = EvidenceRetriever::new(Arc::new(client_for(&server)));
    let items = retriever.retrieve("frozen shoulder", 5).await;

    assert_eq!(
        items,
        vec![
            EvidenceItem::new("11", "Exercise therapy for adhesive capsulitis"),
            EvidenceItem::new("22", "Hydrodilatation versus injection"),
            EvidenceItem::new("33", "Manual therapy in frozen shoulder"),
        ]
    );
}

#[tokio::test]
async fn test_unresolved_record_keeps_its_slot_with_empty_title() {
    let server = MockServer::start().await;
    mount_search(&server, &["1", "2"]).await;
    Mock::given(method("GET"))
        .and(path("/esummary.fcgi"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {
                "uids": ["1"],
                "1": { "uid": "1", "title": "Graded exposure for chronic low back pain" },
                "2": { "uid": "2", "error": "cannot get document summary" }
            }
        })))
        .mount(&server)
        .await;

    let retriever = EvidenceRetriever::new(Arc::new(client_for(&server)));
    let items = retriever.retrieve("low back pain", 5).await;

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].title, "Graded exposure for chronic low back pain");
    assert_eq!(items[1], EvidenceItem::new("2", ""));
}

#[tokio::test]
async fn test_server_error_degrades_to_no_evidence() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/esummary.fcgi"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let retriever = EvidenceRetriever::new(Arc::new(client_for(&server)));
    assert!(retriever.retrieve("ankle sprain", 5).await.is_empty());
}

#[tokio::test]
async fn test_malformed_summary_degrades_to_no_evidence() {
    let server = MockServer::start().await;
    mount_search(&server, &["7"]).await;
    Mock::given(method("GET"))
        .and(path("/esummary.fcgi"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let retriever = EvidenceRetriever::new(Arc::new(client_for(&server)));
    assert!(retriever.retrieve("tendinopathy", 5).await.is_empty());
}

#[tokio::test]
async fn test_empty_search_skips_fetch() {
    let server = MockServer::start().await;
    mount_search(&server, &[]).await;
    Mock::given(method("GET"))
        .and(path("/esummary.fcgi"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let retriever = EvidenceRetriever::new(Arc::new(client_for(&server)));
    assert!(retriever.retrieve("very rare syndrome", 5).await.is_empty());
}

#[tokio::test]
async fn test_config_credentials_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .and(query_param("api_key", "ncbi-key"))
        .and(query_param("tool", "physiocase"))
        .and(query_param("email", "lecturer@example.edu"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "esearchresult": { "idlist": [] }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = EvidenceConfig {
        base_url: server.uri(),
        api_key: "ncbi-key".to_string(),
        tool: Some("physiocase".to_string()),
        email: Some("lecturer@example.edu".to_string()),
        ..EvidenceConfig::default()
    };

    let retriever = EvidenceRetriever::from_config(&config).expect("retriever should build");
    assert!(retriever.retrieve("whiplash", 5).await.is_empty());
}
