//! Performance benchmarks for the relay hot path
//!
//! Run with: cargo bench
//! Or for specific benchmarks: cargo bench -- <filter>

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::time::Duration;

use live_relay::core::realtime::classify::{classify_close, classify_text};
use live_relay::core::realtime::media::encode_payload;
use live_relay::core::realtime::{MediaInput, RealtimeProvider, WireCodec, codec_for};
use live_relay::relay::RelayIncomingMessage;

fn audio_payload(bytes: usize) -> String {
    encode_payload(&vec![0x5au8; bytes])
}

/// Client frame parsing and size validation
fn bench_client_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("client_parsing");
    group.measurement_time(Duration::from_secs(5));

    let selection = r#"{"type":"model_selection","model":"gemini-2.0-flash-exp","mode":"audio_only"}"#.to_string();
    let text = format!(
        r#"{{"type":"text","text":"{}"}}"#,
        "Describe what you see. ".repeat(20)
    );
    // 20 ms of 16 kHz mono PCM
    let audio = format!(
        r#"{{"type":"audio_chunk","data":"{}","mimeType":"audio/pcm;rate=16000"}}"#,
        audio_payload(640)
    );
    // A typical 640x480 JPEG frame
    let video = format!(
        r#"{{"type":"video_frame","data":"{}","timestamp":1712345678.5}}"#,
        audio_payload(48 * 1024)
    );

    for (name, frame) in [
        ("model_selection", &selection),
        ("text", &text),
        ("audio_chunk", &audio),
        ("video_frame", &video),
    ] {
        group.throughput(Throughput::Bytes(frame.len() as u64));
        group.bench_with_input(BenchmarkId::new(name, frame.len()), frame, |b, frame| {
            b.iter(|| {
                let message: RelayIncomingMessage = serde_json::from_str(black_box(frame)).unwrap();
                message.validate_size().unwrap();
            });
        });
    }

    group.finish();
}

/// Client media to provider envelopes
fn bench_upstream_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("upstream_encoding");
    group.measurement_time(Duration::from_secs(5));

    let inputs = [
        (
            "audio_chunk",
            MediaInput::AudioChunk {
                data: audio_payload(640),
                mime_type: "audio/pcm;rate=16000".to_string(),
            },
        ),
        (
            "video_frame",
            MediaInput::VideoFrame {
                data: audio_payload(48 * 1024),
            },
        ),
        (
            "text",
            MediaInput::Text {
                text: "What is on my desk?".to_string(),
            },
        ),
    ];

    for provider in [RealtimeProvider::Gemini, RealtimeProvider::OpenAI] {
        let codec = codec_for(provider);
        for (name, input) in &inputs {
            group.bench_with_input(
                BenchmarkId::new(provider.as_str(), name),
                input,
                |b, input| {
                    b.iter(|| codec.to_upstream(black_box(input)));
                },
            );
        }
    }

    group.finish();
}

/// Provider frames to client notifications
fn bench_downstream_decoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("downstream_decoding");
    group.measurement_time(Duration::from_secs(5));

    let gemini = codec_for(RealtimeProvider::Gemini);
    let gemini_turn = r#"{"serverContent":{"modelTurn":{"parts":[{"text":"There is a laptop and a coffee mug on the desk."}]},"turnComplete":true}}"#;
    group.bench_function("gemini_server_content", |b| {
        b.iter(|| gemini.decode(black_box(gemini_turn)));
    });

    let openai = codec_for(RealtimeProvider::OpenAI);
    let openai_delta = r#"{"type":"response.text.delta","event_id":"evt_1","response_id":"resp_1","item_id":"item_1","output_index":0,"content_index":0,"delta":"There is a laptop"}"#;
    group.bench_function("openai_text_delta", |b| {
        b.iter(|| openai.decode(black_box(openai_delta)));
    });

    group.finish();
}

/// Failure classification of close frames and error text
fn bench_classification(c: &mut Criterion) {
    let mut group = c.benchmark_group("classification");

    group.bench_function("close_quota", |b| {
        b.iter(|| {
            classify_close(
                black_box(Some(1011)),
                black_box("RESOURCE_EXHAUSTED: You exceeded your current quota"),
            )
        });
    });

    group.bench_function("text_unmatched", |b| {
        b.iter(|| classify_text(black_box("Internal error encountered while processing the request")));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_client_parsing,
    bench_upstream_encoding,
    bench_downstream_decoding,
    bench_classification
);
criterion_main!(benches);
