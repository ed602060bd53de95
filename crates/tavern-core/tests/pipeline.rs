use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use std::sync::{Arc, Mutex};

use tavern_core::{
    ChatTurn, ConfiguredInstruction, GenerationBackend, GenerationParameters, GenerationRequest,
    PersonaMode, Pipeline, TavernError, TextStream,
};

/// Records every request and replies with fixed chunks
#[derive(Default)]
struct RecordingBackend {
    requests: Mutex<Vec<GenerationRequest>>,
    chunks: Vec<&'static str>,
}

#[async_trait]
impl GenerationBackend for RecordingBackend {
    async fn generate(&self, request: GenerationRequest) -> tavern_core::Result<TextStream> {
        self.requests.lock().unwrap().push(request);
        let chunks: Vec<tavern_core::Result<String>> =
            self.chunks.iter().map(|c| Ok(c.to_string())).collect();
        Ok(Box::pin(stream::iter(chunks)))
    }
}

struct FailingBackend;

#[async_trait]
impl GenerationBackend for FailingBackend {
    async fn generate(&self, _request: GenerationRequest) -> tavern_core::Result<TextStream> {
        Err(TavernError::provider(401, "invalid api key"))
    }
}

/// Accepts the request, then breaks after one chunk
struct BrokenStreamBackend;

#[async_trait]
impl GenerationBackend for BrokenStreamBackend {
    async fn generate(&self, _request: GenerationRequest) -> tavern_core::Result<TextStream> {
        let items: Vec<tavern_core::Result<String>> = vec![
            Ok("partial".to_string()),
            Err(TavernError::provider(200, "stream reset")),
        ];
        Ok(Box::pin(stream::iter(items)))
    }
}

fn instruction(persona: Option<&str>, mode: PersonaMode) -> Arc<ConfiguredInstruction> {
    Arc::new(ConfiguredInstruction {
        base: Some("Be helpful.".to_string()),
        persona: persona.map(str::to_string),
        mode,
    })
}

#[tokio::test]
async fn test_turns_forwarded_unchanged() {
    let backend = Arc::new(RecordingBackend {
        chunks: vec!["Hel", "lo"],
        ..Default::default()
    });
    let pipeline = Pipeline::new(
        backend.clone(),
        instruction(None, PersonaMode::Append),
        "test-model",
    );

    let turns = vec![
        ChatTurn::system("earlier note"),
        ChatTurn::user("first"),
        ChatTurn::assistant("reply"),
        ChatTurn::user("second"),
    ];
    let stream = pipeline.process(turns.clone(), None).await.unwrap();
    let text: Vec<String> = stream.map(|c| c.unwrap()).collect().await;
    assert_eq!(text.concat(), "Hello");

    let requests = backend.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].turns, turns);
    assert_eq!(requests[0].model, "test-model");
    assert_eq!(requests[0].system, "Be helpful.");
    assert_eq!(requests[0].parameters, None);
}

#[tokio::test]
async fn test_empty_history_still_forwarded() {
    let backend = Arc::new(RecordingBackend::default());
    let pipeline = Pipeline::new(backend.clone(), instruction(None, PersonaMode::Append), "m");

    let stream = pipeline.process(Vec::new(), None).await.unwrap();
    assert_eq!(stream.count().await, 0);
    assert!(backend.requests.lock().unwrap()[0].turns.is_empty());
}

#[tokio::test]
async fn test_persona_and_parameters_reach_backend() {
    let backend = Arc::new(RecordingBackend::default());
    let pipeline = Pipeline::new(
        backend.clone(),
        instruction(Some("You haunt a tavern."), PersonaMode::Append),
        "m",
    );

    let params = GenerationParameters {
        temperature: 1.2,
        ..Default::default()
    };
    let _ = pipeline
        .process(vec![ChatTurn::user("hi")], Some(params))
        .await
        .unwrap();

    let requests = backend.requests.lock().unwrap();
    assert_eq!(requests[0].system, "Be helpful.\n\nYou haunt a tavern.");
    assert_eq!(requests[0].parameters, Some(params));
}

#[tokio::test]
async fn test_overwrite_persona() {
    let backend = Arc::new(RecordingBackend::default());
    let pipeline = Pipeline::new(
        backend.clone(),
        instruction(Some("Only the ghost speaks."), PersonaMode::Overwrite),
        "m",
    );
    let _ = pipeline.process(vec![ChatTurn::user("hi")], None).await.unwrap();
    assert_eq!(
        backend.requests.lock().unwrap()[0].system,
        "Only the ghost speaks."
    );
}

#[tokio::test]
async fn test_backend_error_propagates_untranslated() {
    let pipeline = Pipeline::new(
        Arc::new(FailingBackend),
        instruction(None, PersonaMode::Append),
        "m",
    );
    match pipeline.process(vec![ChatTurn::user("hi")], None).await {
        Err(TavernError::Provider { status, body }) => {
            assert_eq!(status, 401);
            assert_eq!(body, "invalid api key");
        }
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("expected failure"),
    }
}

#[tokio::test]
async fn test_mid_stream_error_is_delivered_after_partial_text() {
    let pipeline = Pipeline::new(
        Arc::new(BrokenStreamBackend),
        instruction(None, PersonaMode::Append),
        "m",
    );
    let items: Vec<_> = pipeline
        .process(vec![ChatTurn::user("hi")], None)
        .await
        .unwrap()
        .collect()
        .await;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_deref().unwrap(), "partial");
    assert!(items[1].is_err());
}

#[tokio::test]
async fn test_closure_instruction_source() {
    let backend = Arc::new(RecordingBackend::default());
    let pipeline = Pipeline::new(backend.clone(), Arc::new(|| "dynamic".to_string()), "m");
    let _ = pipeline.process(vec![ChatTurn::user("x")], None).await.unwrap();
    assert_eq!(backend.requests.lock().unwrap()[0].system, "dynamic");
}
