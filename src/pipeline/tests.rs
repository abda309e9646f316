use super::*;
use crate::config::PipelineConfig;
use crate::types::DataEvent;
use crate::Error;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn text_start(id: &str) -> UiStreamEvent {
    UiStreamEvent::TextStart {
        id: id.into(),
        provider_metadata: None,
    }
}

fn text_delta(id: &str, delta: &str) -> UiStreamEvent {
    UiStreamEvent::TextDelta {
        id: id.into(),
        delta: delta.into(),
        provider_metadata: None,
    }
}

fn text_end(id: &str) -> UiStreamEvent {
    UiStreamEvent::TextEnd {
        id: id.into(),
        provider_metadata: None,
    }
}

fn reasoning(id: &str, text: &str) -> Vec<UiStreamEvent> {
    vec![
        UiStreamEvent::ReasoningStart {
            id: id.into(),
            provider_metadata: None,
        },
        UiStreamEvent::ReasoningDelta {
            id: id.into(),
            delta: text.into(),
            provider_metadata: None,
        },
        UiStreamEvent::ReasoningEnd {
            id: id.into(),
            provider_metadata: None,
        },
    ]
}

fn start() -> UiStreamEvent {
    UiStreamEvent::Start {
        message_id: Some("msg-1".into()),
        message_metadata: None,
    }
}

fn finish() -> UiStreamEvent {
    UiStreamEvent::Finish {
        message_metadata: None,
    }
}

fn weather_call(output: Value) -> Vec<UiStreamEvent> {
    vec![
        UiStreamEvent::ToolInputStart {
            tool_call_id: "3".into(),
            tool_name: "weather".into(),
            dynamic: None,
            provider_executed: None,
        },
        UiStreamEvent::ToolInputDelta {
            tool_call_id: "3".into(),
            input_text_delta: r#"{"location":"Tokyo"}"#.into(),
        },
        UiStreamEvent::ToolInputAvailable {
            tool_call_id: "3".into(),
            tool_name: "weather".into(),
            input: json!({"location": "Tokyo"}),
            dynamic: None,
            provider_executed: None,
            provider_metadata: None,
        },
        UiStreamEvent::ToolOutputAvailable {
            tool_call_id: "3".into(),
            output,
            dynamic: None,
            provider_executed: None,
            preliminary: None,
        },
    ]
}

/// start, start-step, text "Hello World", finish-step, finish
fn hello_world() -> Vec<UiStreamEvent> {
    vec![
        start(),
        UiStreamEvent::StartStep,
        text_start("1"),
        text_delta("1", "Hello"),
        text_delta("1", " World"),
        text_end("1"),
        UiStreamEvent::FinishStep,
        finish(),
    ]
}

async fn run(pipeline: &Pipeline, events: Vec<UiStreamEvent>) -> Vec<UiStreamEvent> {
    let output = pipeline.process_stream(from_events(events)).await.unwrap();
    output.map(|r| r.unwrap()).collect().await
}

async fn run_items(pipeline: &Pipeline, items: Vec<PipeResult<UiStreamEvent>>) -> Vec<PipeResult<UiStreamEvent>> {
    let output = pipeline
        .process_stream(Box::pin(stream::iter(items)))
        .await
        .unwrap();
    output.collect().await
}

fn single(transform: impl Transform + 'static) -> Pipeline {
    PipelineBuilder::new()
        .add_transform(Box::new(transform))
        .build()
        .unwrap()
}

fn counting_ids() -> IdGenerator {
    let counter = Arc::new(AtomicUsize::new(0));
    IdGenerator::from_fn(move || format!("gen-{}", counter.fetch_add(1, Ordering::SeqCst)))
}

fn uppercase_deltas() -> MapOperator {
    MapOperator::new(|ev, _| match ev {
        UiStreamEvent::TextDelta {
            id,
            delta,
            provider_metadata,
        } => Emit::One(UiStreamEvent::TextDelta {
            id,
            delta: delta.to_uppercase(),
            provider_metadata,
        }),
        other => Emit::One(other),
    })
}

fn celsius_to_fahrenheit() -> FlatMapOperator {
    FlatMapOperator::new(|mut part, _| {
        if let Some(tool) = part.as_tool_mut() {
            if let Some(c) = tool.output.as_ref().and_then(|o| o["temperature"].as_f64()) {
                if let Some(output) = tool.output.as_mut() {
                    output["temperature"] = json!(c * 9.0 / 5.0 + 32.0);
                }
            }
        }
        Emit::One(part)
    })
    .when_parts(["tool-weather"])
    .unwrap()
}

#[tokio::test]
async fn test_filter_to_text_is_identity_for_text_stream() {
    let pipeline = PipelineBuilder::new()
        .filter(FilterOperator::include_parts(["text"]).unwrap())
        .build()
        .unwrap();
    assert_eq!(run(&pipeline, hello_world()).await, hello_world());
}

#[tokio::test]
async fn test_map_uppercases_deltas_only() {
    let pipeline = PipelineBuilder::new().map(uppercase_deltas()).build().unwrap();
    let output = run(&pipeline, hello_world()).await;

    let mut expected = hello_world();
    expected[3] = text_delta("1", "HELLO");
    expected[4] = text_delta("1", " WORLD");
    assert_eq!(output, expected);
}

#[tokio::test]
async fn test_flat_map_rewrites_buffered_tool_part() {
    let mut input = vec![start(), UiStreamEvent::StartStep];
    input.extend(weather_call(json!({"temperature": 100})));
    input.extend([UiStreamEvent::FinishStep, finish()]);

    let output = run(&single(celsius_to_fahrenheit()), input).await;

    let mut expected = vec![start(), UiStreamEvent::StartStep];
    expected.extend(weather_call(json!({"temperature": 212.0})));
    expected.extend([UiStreamEvent::FinishStep, finish()]);
    assert_eq!(output, expected);
}

#[tokio::test]
async fn test_empty_steps_are_suppressed_by_every_operator() {
    let input = vec![UiStreamEvent::StartStep, UiStreamEvent::FinishStep];

    let filter = single(FilterOperator::new(|_, _| true));
    let map = single(uppercase_deltas());
    let flat_map = single(FlatMapOperator::new(|part, _| Emit::One(part)));
    let chain = PipelineBuilder::new()
        .filter(FilterOperator::exclude_parts(["reasoning"]).unwrap())
        .map(uppercase_deltas())
        .flat_map(FlatMapOperator::coalesce(["tool-*"]).unwrap())
        .build()
        .unwrap();

    for pipeline in [&filter, &map, &flat_map, &chain] {
        assert!(run(pipeline, input.clone()).await.is_empty());
    }
}

#[tokio::test]
async fn test_excluded_content_keeps_step_markers() {
    let mut input = vec![start(), UiStreamEvent::StartStep];
    input.extend(reasoning("r1", "thinking"));
    input.extend([
        UiStreamEvent::FinishStep,
        UiStreamEvent::StartStep,
        text_start("t1"),
        text_delta("t1", "answer"),
        text_end("t1"),
        UiStreamEvent::FinishStep,
        finish(),
    ]);

    let pipeline = PipelineBuilder::new()
        .filter(FilterOperator::exclude_parts(["reasoning"]).unwrap())
        .build()
        .unwrap();
    let output = run(&pipeline, input).await;

    assert_eq!(
        output,
        vec![
            start(),
            UiStreamEvent::StartStep,
            UiStreamEvent::FinishStep,
            UiStreamEvent::StartStep,
            text_start("t1"),
            text_delta("t1", "answer"),
            text_end("t1"),
            UiStreamEvent::FinishStep,
            finish(),
        ]
    );
}

#[tokio::test]
async fn test_filtering_preserves_meta_and_step_order() {
    let mut input = vec![start(), UiStreamEvent::StartStep];
    input.extend(reasoning("r1", "a"));
    input.push(UiStreamEvent::MessageMetadata {
        message_metadata: json!({"usage": 3}),
    });
    input.extend([text_start("t1"), text_delta("t1", "b"), text_end("t1")]);
    input.push(UiStreamEvent::Data(DataEvent::new("chart", json!([1, 2]))));
    input.extend([UiStreamEvent::FinishStep, finish()]);

    let pipeline = single(FilterOperator::include_parts(["text"]).unwrap());
    let output = run(&pipeline, input.clone()).await;

    let expected: Vec<_> = input
        .into_iter()
        .filter(|e| !e.is_content() || matches!(e.event_type().as_str(), "text-start" | "text-delta" | "text-end"))
        .collect();
    assert_eq!(output, expected);
}

#[tokio::test]
async fn test_pass_through_operators_are_identity() {
    let mut input = hello_world();
    input.insert(2, UiStreamEvent::Data(DataEvent::new("status", json!("ok")).with_id("s")));
    input.splice(6..6, weather_call(json!({"temperature": 1})));

    let pipeline = PipelineBuilder::new()
        .filter(FilterOperator::new(|_, _| true))
        .map(MapOperator::new(|ev, _| Emit::One(ev)))
        .build()
        .unwrap();
    assert_eq!(run(&pipeline, input.clone()).await, input);
}

#[tokio::test]
async fn test_interleaved_data_keeps_its_own_part() {
    let mut call = weather_call(json!({"temperature": 100}));
    let progress = UiStreamEvent::Data(DataEvent::new("progress", json!({"pct": 50})));
    call.insert(2, progress.clone());

    let mut input = vec![UiStreamEvent::StartStep];
    input.extend(call);
    input.push(UiStreamEvent::FinishStep);

    let output = run(&single(celsius_to_fahrenheit()), input).await;

    // data streams through immediately; the buffered call follows as one block
    let mut expected = vec![UiStreamEvent::StartStep, progress];
    expected.extend(weather_call(json!({"temperature": 212.0})));
    expected.push(UiStreamEvent::FinishStep);
    assert_eq!(output, expected);
}

#[tokio::test]
async fn test_unbuffered_parts_keep_their_position() {
    let mut input = vec![UiStreamEvent::StartStep];
    let call = weather_call(json!({"temperature": 0}));
    input.extend(call[..2].iter().cloned());
    input.extend([text_start("t"), text_delta("t", "x"), text_end("t")]);
    input.extend(call[2..].iter().cloned());
    input.push(UiStreamEvent::FinishStep);

    let pipeline = single(FlatMapOperator::coalesce(["tool-*"]).unwrap());
    let output = run(&pipeline, input).await;

    let mut expected = vec![
        UiStreamEvent::StartStep,
        text_start("t"),
        text_delta("t", "x"),
        text_end("t"),
    ];
    expected.extend(call);
    expected.push(UiStreamEvent::FinishStep);
    assert_eq!(output, expected);
}

#[tokio::test]
async fn test_incomplete_parts_are_flushed_at_end_of_stream() {
    let input = vec![
        UiStreamEvent::StartStep,
        UiStreamEvent::ToolInputStart {
            tool_call_id: "c".into(),
            tool_name: "search".into(),
            dynamic: None,
            provider_executed: None,
        },
        UiStreamEvent::ToolInputDelta {
            tool_call_id: "c".into(),
            input_text_delta: r#"{"q":"ru"#.into(),
        },
        text_start("t"),
        text_delta("t", "partial"),
    ];

    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);
    let flat_map = FlatMapOperator::new(move |part, _| {
        recorder
            .lock()
            .unwrap()
            .push((part.part_type(), part.is_complete()));
        Emit::One(part)
    });
    let output = run(&single(flat_map), input).await;

    assert_eq!(
        output,
        vec![
            UiStreamEvent::StartStep,
            UiStreamEvent::ToolInputStart {
                tool_call_id: "c".into(),
                tool_name: "search".into(),
                dynamic: None,
                provider_executed: None,
            },
            UiStreamEvent::ToolInputDelta {
                tool_call_id: "c".into(),
                input_text_delta: r#"{"q":"ru"#.into(),
            },
            text_start("t"),
            text_delta("t", "partial"),
        ]
    );
    assert_eq!(
        *seen.lock().unwrap(),
        vec![("tool-search".to_string(), false), ("text".to_string(), false)]
    );
}

#[tokio::test]
async fn test_open_text_is_flushed_before_finish_step() {
    let input = vec![
        UiStreamEvent::StartStep,
        text_start("t"),
        text_delta("t", "cut"),
        UiStreamEvent::FinishStep,
        UiStreamEvent::StartStep,
        text_start("t"),
        text_delta("t", "next"),
        text_end("t"),
        UiStreamEvent::FinishStep,
    ];
    let pipeline = single(FlatMapOperator::new(|part, _| Emit::One(part)));
    let output = run(&pipeline, input).await;

    assert_eq!(
        output,
        vec![
            UiStreamEvent::StartStep,
            text_start("t"),
            text_delta("t", "cut"),
            UiStreamEvent::FinishStep,
            UiStreamEvent::StartStep,
            text_start("t"),
            text_delta("t", "next"),
            text_end("t"),
            UiStreamEvent::FinishStep,
        ]
    );
}

#[tokio::test]
async fn test_flat_map_can_drop_and_split_parts() {
    let input = vec![
        UiStreamEvent::StartStep,
        text_start("t1"),
        text_delta("t1", "a|b"),
        text_end("t1"),
        UiStreamEvent::FinishStep,
        UiStreamEvent::StartStep,
    ]
    .into_iter()
    .chain(reasoning("r1", "hidden"))
    .chain([UiStreamEvent::FinishStep])
    .collect();

    let split = FlatMapOperator::new(|part, _| match part {
        UiMessagePart::Text { text, .. } => {
            Emit::Many(text.split('|').map(UiMessagePart::text).collect())
        }
        UiMessagePart::Reasoning { .. } => Emit::Drop,
        other => Emit::One(other),
    })
    .with_id_generator(counting_ids());

    let output = run(&single(split), input).await;
    assert_eq!(
        output,
        vec![
            UiStreamEvent::StartStep,
            text_start("t1"),
            text_delta("t1", "a"),
            text_end("t1"),
            text_start("gen-0"),
            text_delta("gen-0", "b"),
            text_end("gen-0"),
            UiStreamEvent::FinishStep,
        ]
    );
}

#[tokio::test]
async fn test_flat_map_history_lists_prior_completed_parts() {
    let input = vec![
        text_start("a"),
        text_end("a"),
        UiStreamEvent::File {
            media_type: "image/png".into(),
            url: "https://example.com/a.png".into(),
            provider_metadata: None,
        },
        text_start("b"),
        text_end("b"),
    ];
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);
    let flat_map = FlatMapOperator::new(move |part, history| {
        recorder
            .lock()
            .unwrap()
            .push((history.index, history.completed.len()));
        Emit::One(part)
    });
    run(&single(flat_map), input).await;
    assert_eq!(
        *seen.lock().unwrap(),
        vec![(Some(0), 0), (Some(1), 1), (Some(2), 2)]
    );
}

#[tokio::test]
async fn test_transient_data_is_buffered_and_keeps_flag() {
    let transient = UiStreamEvent::Data(DataEvent::new("notice", json!("hi")).with_id("n").transient());
    let pipeline = single(FlatMapOperator::new(|part, history| {
        assert!(history.index.is_none());
        Emit::One(part)
    }));
    let output = run(&pipeline, vec![transient.clone()]).await;
    assert_eq!(output, vec![transient]);
}

#[tokio::test]
async fn test_map_sees_the_owning_part() {
    let mut input = vec![UiStreamEvent::StartStep];
    input.extend(weather_call(json!(null)));
    input.push(UiStreamEvent::FinishStep);
    input.extend([
        UiStreamEvent::StartStep,
        text_start("t"),
        text_delta("t", "kept"),
        text_end("t"),
        UiStreamEvent::FinishStep,
    ]);

    let drop_tools = MapOperator::new(|ev, part| {
        if part.part_type().starts_with("tool-") {
            Emit::Drop
        } else {
            Emit::One(ev)
        }
    });
    let output = run(&single(drop_tools), input).await;

    // the tool-only step emits nothing, so its markers are suppressed
    assert_eq!(
        output,
        vec![
            UiStreamEvent::StartStep,
            text_start("t"),
            text_delta("t", "kept"),
            text_end("t"),
            UiStreamEvent::FinishStep,
        ]
    );
}

#[tokio::test]
async fn test_map_can_fan_out() {
    let pipeline = single(MapOperator::new(|ev, _| match ev {
        UiStreamEvent::TextDelta { id, delta, .. } => Emit::Many(
            delta
                .chars()
                .map(|c| text_delta(&id, &c.to_string()))
                .collect(),
        ),
        other => other.into(),
    }));
    let output = run(&pipeline, vec![text_start("1"), text_delta("1", "ab"), text_end("1")]).await;
    assert_eq!(
        output,
        vec![text_start("1"), text_delta("1", "a"), text_delta("1", "b"), text_end("1")]
    );
}

#[tokio::test]
async fn test_orphans_are_dropped_and_unknown_events_forwarded() {
    let ping = UiStreamEvent::Unknown(json!({"type": "ping", "seq": 1}));
    let input = vec![
        ping.clone(),
        text_delta("ghost", "x"),
        UiStreamEvent::ToolOutputAvailable {
            tool_call_id: "ghost".into(),
            output: json!(1),
            dynamic: None,
            provider_executed: None,
            preliminary: None,
        },
        UiStreamEvent::StartStep,
        ping.clone(),
        UiStreamEvent::FinishStep,
    ];

    let filter = single(FilterOperator::new(|_, _| true));
    let map = single(MapOperator::new(|ev, _| Emit::One(ev)));
    let flat_map = single(FlatMapOperator::new(|part, _| Emit::One(part)));
    for pipeline in [&filter, &map, &flat_map] {
        // unknown events never open a step
        assert_eq!(run(pipeline, input.clone()).await, vec![ping.clone(), ping.clone()]);
    }
}

#[tokio::test]
async fn test_source_error_ends_output_without_flush() {
    let items = vec![
        Ok(UiStreamEvent::StartStep),
        Ok(text_start("t")),
        Err(Error::runtime_with_context(
            "connection reset",
            crate::ErrorContext::new().with_source("test"),
        )),
        Ok(text_delta("t", "never")),
    ];

    let flat_map = single(FlatMapOperator::new(|part, _| Emit::One(part)));
    let output = run_items(&flat_map, items).await;
    assert_eq!(output.len(), 1);
    assert!(matches!(output[0], Err(Error::Runtime { .. })));
}

#[tokio::test]
async fn test_unsupported_part_is_a_stream_error() {
    let pipeline = single(FlatMapOperator::new(|_, _| Emit::One(UiMessagePart::StepStart)));
    let items = vec![
        Ok(UiStreamEvent::StartStep),
        Ok(text_start("t")),
        Ok(text_end("t")),
        Ok(text_start("u")),
    ];
    let output = run_items(&pipeline, items).await;
    assert_eq!(output.len(), 1);
    match &output[0] {
        Err(Error::Pipeline(PipelineError::UnsupportedPart { part_type, hint })) => {
            assert_eq!(part_type, "step-start");
            assert!(hint.is_some());
        }
        other => panic!("unexpected item: {:?}", other.as_ref().map(|e| e.event_type())),
    }
}

#[tokio::test]
async fn test_operators_compose_in_order() {
    let mut input = vec![start(), UiStreamEvent::StartStep];
    input.extend(reasoning("r", "hmm"));
    input.extend(weather_call(json!({"temperature": 0})));
    input.extend([text_start("t"), text_delta("t", "done"), text_end("t")]);
    input.extend([UiStreamEvent::FinishStep, finish()]);

    let pipeline = PipelineBuilder::new()
        .filter(FilterOperator::exclude_parts(["reasoning"]).unwrap())
        .flat_map(celsius_to_fahrenheit())
        .map(uppercase_deltas())
        .build()
        .unwrap();
    let output = run(&pipeline, input).await;

    let mut expected = vec![start(), UiStreamEvent::StartStep];
    expected.extend(weather_call(json!({"temperature": 32.0})));
    expected.extend([text_start("t"), text_delta("t", "DONE"), text_end("t")]);
    expected.extend([UiStreamEvent::FinishStep, finish()]);
    assert_eq!(output, expected);
}

#[tokio::test]
async fn test_empty_pipeline_passes_everything() {
    let pipeline = PipelineBuilder::new().build().unwrap();
    assert!(pipeline.is_empty());
    let input = vec![UiStreamEvent::StartStep, UiStreamEvent::FinishStep];
    assert_eq!(run(&pipeline, input.clone()).await, input);
}

#[tokio::test]
async fn test_process_stream_with_message() {
    let pipeline = single(FilterOperator::exclude_parts(["reasoning"]).unwrap());
    let mut input = hello_world();
    input.splice(2..2, reasoning("r", "private"));

    let (events, message) = pipeline
        .process_stream_with_message(from_events(input))
        .await
        .unwrap();
    let (events, message) = tokio::join!(events.collect::<Vec<_>>(), message);

    let events: Vec<_> = events.into_iter().map(|r| r.unwrap()).collect();
    assert_eq!(events, hello_world());

    let message = message.unwrap();
    assert_eq!(message.id.as_deref(), Some("msg-1"));
    assert_eq!(message.text(), "Hello World");
    assert!(message.parts.iter().all(|p| p.part_type() != "reasoning"));
}

#[tokio::test]
async fn test_message_resolves_after_event_stream_is_dropped() {
    let (tx, rx) = tokio::sync::mpsc::channel(8);
    let source: BoxStream<'static, UiStreamEvent> =
        Box::pin(tokio_stream::wrappers::ReceiverStream::new(rx));
    let pipeline = single(FilterOperator::exclude_parts(["reasoning"]).unwrap());
    let (mut events, message) = pipeline.process_stream_with_message(source).await.unwrap();

    let message = tokio::spawn(message);
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    assert!(events.next().now_or_never().is_none());
    drop(events);

    for event in hello_world() {
        tx.send(Ok(event)).await.unwrap();
    }
    drop(tx);

    let message = tokio::time::timeout(std::time::Duration::from_millis(500), message)
        .await
        .expect("message future stayed parked")
        .unwrap()
        .unwrap();
    assert_eq!(message.text(), "Hello World");
}

#[tokio::test]
async fn test_coalesced_tool_without_input_is_unchanged() {
    let start = UiStreamEvent::ToolInputStart {
        tool_call_id: "c1".into(),
        tool_name: "weather".into(),
        dynamic: None,
        provider_executed: None,
    };
    let outcomes = vec![
        UiStreamEvent::ToolOutputError {
            tool_call_id: "c1".into(),
            error_text: "boom".into(),
            dynamic: None,
            provider_executed: None,
        },
        UiStreamEvent::ToolOutputDenied {
            tool_call_id: "c1".into(),
        },
    ];
    let pipeline = single(FlatMapOperator::coalesce(["tool-*"]).unwrap());
    for outcome in outcomes {
        let events = vec![start.clone(), outcome];
        assert_eq!(run(&pipeline, events.clone()).await, events);
    }
}

#[tokio::test]
async fn test_message_future_reports_empty_stream() {
    let pipeline = PipelineBuilder::new().build().unwrap();
    let (events, message) = pipeline
        .process_stream_with_message(from_events(vec![start(), finish()]))
        .await
        .unwrap();
    drop(events);
    let err = message.await.unwrap_err();
    assert!(matches!(
        err.as_pipeline(),
        Some(PipelineError::EmptyMessage { .. })
    ));
}

#[tokio::test]
async fn test_cancel_releases_source() {
    let (tx, rx) = tokio::sync::mpsc::channel::<PipeResult<UiStreamEvent>>(8);
    let source: BoxStream<'static, UiStreamEvent> =
        Box::pin(tokio_stream::wrappers::ReceiverStream::new(rx));

    let pipeline = single(FlatMapOperator::coalesce(["tool-*"]).unwrap());
    let (mut output, handle) = pipeline.process_stream_with_cancel(source).await.unwrap();

    tx.send(Ok(UiStreamEvent::StartStep)).await.unwrap();
    tx.send(Ok(text_start("t"))).await.unwrap();
    tx.send(Ok(weather_call(json!(null))[0].clone())).await.unwrap();

    assert_eq!(output.next().await.unwrap().unwrap(), UiStreamEvent::StartStep);
    assert_eq!(output.next().await.unwrap().unwrap(), text_start("t"));

    handle.cancel();
    assert!(output.next().await.is_none());
    // the buffered tool call is discarded and the source is gone
    assert!(tx.is_closed());
}

#[tokio::test]
async fn test_pipeline_from_config() {
    let config = PipelineConfig::from_yaml_str(
        r#"
serializer:
  id_prefix: "p-"
operators:
  - filter:
      exclude_parts: ["reasoning"]
  - buffer:
      parts: ["tool-*"]
"#,
    )
    .unwrap();
    let pipeline = Pipeline::from_config(&config).unwrap();

    let mut input = vec![UiStreamEvent::StartStep];
    input.extend(reasoning("r", "x"));
    input.extend(weather_call(json!({"temperature": 5})));
    input.push(UiStreamEvent::FinishStep);

    let mut expected = vec![UiStreamEvent::StartStep];
    expected.extend(weather_call(json!({"temperature": 5})));
    expected.push(UiStreamEvent::FinishStep);
    assert_eq!(run(&pipeline, input).await, expected);
}

#[tokio::test]
async fn test_from_config_rejects_invalid_operators() {
    let mut config = PipelineConfig::default();
    config
        .operators
        .push(crate::config::OperatorConfig::Buffer(crate::config::BufferConfig {
            parts: vec!["*tool".into()],
        }));
    assert!(matches!(
        Pipeline::from_config(&config),
        Err(PipelineError::Configuration(_))
    ));
}

#[tokio::test]
async fn test_pipeline_state_is_per_stream() {
    let pipeline = single(FlatMapOperator::coalesce(["tool-*"]).unwrap());
    let first = run(&pipeline, weather_call(json!(1))).await;
    let second = run(&pipeline, weather_call(json!(1))).await;
    assert_eq!(first, second);
    assert_eq!(first.len(), 4);
}

#[test]
fn test_emit_conversions() {
    assert_eq!(Emit::<i32>::from(1).into_vec(), vec![1]);
    assert_eq!(Emit::<i32>::from(vec![1, 2]).into_vec(), vec![1, 2]);
    assert_eq!(Emit::<i32>::from(None).into_vec(), Vec::<i32>::new());
    assert_eq!(Emit::<i32>::Drop.into_vec(), Vec::<i32>::new());
}
