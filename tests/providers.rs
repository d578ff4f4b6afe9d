use file_gpt::embeddings::Embedder;
use file_gpt::llm::{relay, ChatModel, NullSink};
use file_gpt::ollama::{OllamaClient, OllamaConfig};
use file_gpt::openai::{OpenAiClient, OpenAiConfig};
use file_gpt::prompt::answer_prompt;
use file_gpt::wikipedia::{WikipediaConfig, WikipediaLoader};
use file_gpt::RagError;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn ollama(server: &MockServer) -> OllamaClient {
    OllamaClient::new(OllamaConfig {
        base_url: server.uri(),
        model: "mistral:latest".to_string(),
        temperature: 0.1,
    })
    .unwrap()
}

fn openai(server: &MockServer) -> OpenAiClient {
    OpenAiClient::new(OpenAiConfig {
        base_url: server.uri(),
        api_key: "sk-test".to_string(),
        model: "gpt-3.5-turbo-1106".to_string(),
        temperature: 0.1,
    })
}

fn ollama_chunk(content: &str, done: bool) -> String {
    let chunk = json!({
        "model": "mistral:latest",
        "created_at": "2024-01-01T00:00:00Z",
        "message": { "role": "assistant", "content": content },
        "done": done
    });
    format!("{}\n", chunk)
}

fn sse(events: &[&str]) -> ResponseTemplate {
    let body: String = events.iter().map(|data| format!("data: {}\n\n", data)).collect();
    ResponseTemplate::new(200).set_body_raw(body, "text/event-stream")
}

fn openai_chunk(delta: serde_json::Value, finish_reason: Option<&str>) -> String {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion.chunk",
        "created": 1700000000,
        "model": "gpt-3.5-turbo-1106",
        "choices": [{ "index": 0, "delta": delta, "finish_reason": finish_reason }]
    })
    .to_string()
}

#[tokio::test]
async fn ollama_embeds_a_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({ "model": "mistral:latest" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "mistral:latest",
            "embeddings": [[0.1, 0.2], [0.3, 0.4]]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ollama(&server);
    let vectors = client
        .embed_documents(&["first".to_string(), "second".to_string()])
        .await
        .unwrap();

    assert_eq!(vectors.len(), 2);
    assert_eq!(vectors[1].values, vec![0.3, 0.4]);
    assert_eq!(client.model_id(), "ollama/mistral:latest");
}

#[tokio::test]
async fn ollama_embedding_failure_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model not found"))
        .mount(&server)
        .await;

    let result = ollama(&server).embed_query("hello").await;
    assert!(matches!(result, Err(RagError::Embedding(msg)) if msg.contains("model not found")));
}

#[tokio::test]
async fn ollama_streams_a_finished_answer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({ "model": "mistral:latest", "stream": true })))
        .respond_with(ResponseTemplate::new(200).set_body_string(ollama_chunk("The sky is blue.", true)))
        .expect(1)
        .mount(&server)
        .await;

    let prompt = answer_prompt("The sky is blue.", "What colour is the sky?");
    let stream = ollama(&server).stream(&prompt).await.unwrap();
    let answer = relay(stream, &mut NullSink).await.unwrap();

    assert_eq!(answer, "The sky is blue.");
}

#[tokio::test]
async fn ollama_stream_without_done_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ollama_chunk("The sky", false)))
        .mount(&server)
        .await;

    let stream = ollama(&server).stream(&answer_prompt("ctx", "q")).await.unwrap();
    let result = relay(stream, &mut NullSink).await;

    assert!(matches!(result, Err(RagError::Generation(_))));
}

#[tokio::test]
async fn ollama_error_chunk_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(format!("{}\n", json!({ "error": "out of memory" }))),
        )
        .mount(&server)
        .await;

    let result = match ollama(&server).stream(&answer_prompt("ctx", "q")).await {
        Ok(stream) => relay(stream, &mut NullSink).await,
        Err(e) => Err(e),
    };

    assert!(matches!(result, Err(RagError::Generation(_))));
}

#[tokio::test]
async fn openai_streams_server_sent_events() {
    let server = MockServer::start().await;
    let first = openai_chunk(json!({ "role": "assistant", "content": "" }), None);
    let second = openai_chunk(json!({ "content": "Question: " }), None);
    let third = openai_chunk(json!({ "content": "Why?" }), None);
    let last = openai_chunk(json!({}), Some("stop"));

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({ "model": "gpt-3.5-turbo-1106", "stream": true })))
        .respond_with(sse(&[&first, &second, &third, &last, "[DONE]"]))
        .mount(&server)
        .await;

    let stream = openai(&server).stream(&answer_prompt("ctx", "q")).await.unwrap();
    let answer = relay(stream, &mut NullSink).await.unwrap();

    assert_eq!(answer, "Question: Why?");
}

#[tokio::test]
async fn openai_stream_without_finish_is_an_error() {
    let server = MockServer::start().await;
    let half = openai_chunk(json!({ "content": "Half" }), None);
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(sse(&[&half]))
        .mount(&server)
        .await;

    let stream = openai(&server).stream(&answer_prompt("ctx", "q")).await.unwrap();
    let result = relay(stream, &mut NullSink).await;

    assert!(matches!(result, Err(RagError::Generation(_))));
}

#[tokio::test]
async fn openai_rejected_key_is_a_generation_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "message": "invalid api key", "type": "invalid_request_error" }
        })))
        .mount(&server)
        .await;

    let result = match openai(&server).stream(&answer_prompt("ctx", "q")).await {
        Ok(stream) => relay(stream, &mut NullSink).await,
        Err(e) => Err(e),
    };
    assert!(matches!(result, Err(RagError::Generation(_))));
}

#[tokio::test]
async fn openai_embeddings_follow_input_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [
                { "object": "embedding", "index": 1, "embedding": [0.0, 1.0] },
                { "object": "embedding", "index": 0, "embedding": [1.0, 0.0] }
            ],
            "model": "text-embedding-3-small"
        })))
        .mount(&server)
        .await;

    let vectors = openai(&server)
        .embed_documents(&["a".to_string(), "b".to_string()])
        .await
        .unwrap();

    assert_eq!(vectors[0].values, vec![1.0, 0.0]);
    assert_eq!(vectors[1].values, vec![0.0, 1.0]);
}

#[tokio::test]
async fn wikipedia_loads_ranked_articles() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .and(query_param("list", "search"))
        .and(query_param("srsearch", "Rust language"))
        .and(query_param("srlimit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "query": { "search": [
                { "ns": 0, "title": "Rust (programming language)", "pageid": 101 },
                { "ns": 0, "title": "Empty page", "pageid": 202 }
            ]}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .and(query_param("pageids", "101"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "query": { "pages": { "101": {
                "pageid": 101,
                "title": "Rust (programming language)",
                "extract": "Rust is a general-purpose programming language."
            }}}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .and(query_param("pageids", "202"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "query": { "pages": { "202": { "pageid": 202, "title": "Empty page", "extract": "" } } }
        })))
        .mount(&server)
        .await;

    let loader = WikipediaLoader::new(WikipediaConfig {
        base_url: format!("{}/w/api.php", server.uri()),
        top_k_results: 2,
    });
    let documents = loader.load("Rust language").await.unwrap();

    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].document_id, "Rust (programming language)");
    assert_eq!(
        documents[0].content,
        "Rust is a general-purpose programming language."
    );
}

#[tokio::test]
async fn wikipedia_outage_is_a_load_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let loader = WikipediaLoader::new(WikipediaConfig {
        base_url: format!("{}/w/api.php", server.uri()),
        top_k_results: 5,
    });
    assert!(matches!(loader.load("Anything").await, Err(RagError::Load(_))));
}
