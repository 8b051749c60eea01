//! HTTP text-to-speech client.
//!
//! `POST {base}/v1/text-to-speech/{voice_id}?output_format=pcm_{rate}` with a
//! JSON body. The engine answers with raw mono 16-bit PCM which is wrapped
//! into a WAV container. Failures are never retried here; the caller owns
//! that decision.

use async_trait::async_trait;
use narrate_audio::PcmBuffer;
use narrate_core::{SynthesisEngine, SynthesisError, SynthesisRequest, SynthesisResponse};
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::config::SynthConfig;

/// Response header carrying the engine's request id.
pub const REQUEST_ID_HEADER: &str = "request-id";

#[derive(Debug, Serialize)]
struct VoiceSettingsBody {
    stability: f32,
    similarity_boost: f32,
    style: f32,
    use_speaker_boost: bool,
    speed: f32,
}

#[derive(Debug, Serialize)]
struct SynthesisBody<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettingsBody,
    #[serde(skip_serializing_if = "Option::is_none")]
    previous_text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_text: Option<&'a str>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    previous_request_ids: &'a [String],
}

impl<'a> From<&'a SynthesisRequest> for SynthesisBody<'a> {
    fn from(req: &'a SynthesisRequest) -> Self {
        Self {
            text: &req.text,
            model_id: &req.voice.model_id,
            voice_settings: VoiceSettingsBody {
                stability: req.voice.stability,
                similarity_boost: req.voice.similarity_boost,
                style: req.voice.style,
                use_speaker_boost: req.voice.use_speaker_boost,
                speed: req.voice.speed,
            },
            previous_text: req.previous_text.as_deref(),
            next_text: req.next_text.as_deref(),
            previous_request_ids: &req.previous_request_ids,
        }
    }
}

/// Voice engine reached over HTTP.
pub struct HttpSynthesisEngine {
    client: reqwest::Client,
    base_url: Url,
    config: SynthConfig,
}

impl HttpSynthesisEngine {
    /// Build a client for the configured endpoint.
    pub fn new(config: SynthConfig) -> Result<Self, SynthesisError> {
        let mut base_url = Url::parse(&config.base_url).map_err(|e| {
            SynthesisError::Transport(format!("Invalid engine URL {:?}: {e}", config.base_url))
        })?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| SynthesisError::Transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            config,
        })
    }

    /// Full request URL for a voice and sample rate.
    pub fn endpoint(&self, voice_id: &str, sample_rate: u32) -> Result<Url, SynthesisError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| SynthesisError::Transport("Engine URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["v1", "text-to-speech", voice_id]);
        url.query_pairs_mut()
            .append_pair("output_format", &format!("pcm_{sample_rate}"));
        Ok(url)
    }
}

/// Pull a human-readable message out of an error body.
///
/// Understands `{"detail": {"message": ...}}`, `{"detail": "..."}` and
/// `{"message": ...}`; anything else is returned trimmed.
pub fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let detail = &value["detail"];
        let found = detail["message"]
            .as_str()
            .or_else(|| detail.as_str())
            .or_else(|| value["message"].as_str());
        if let Some(message) = found {
            return message.to_string();
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "empty response body".to_string()
    } else {
        trimmed.chars().take(500).collect()
    }
}

#[async_trait]
impl SynthesisEngine for HttpSynthesisEngine {
    async fn synthesize(
        &self,
        request: &SynthesisRequest,
    ) -> Result<SynthesisResponse, SynthesisError> {
        let url = self.endpoint(&request.voice.voice_id, request.sample_rate)?;
        let body = SynthesisBody::from(request);

        let mut builder = self.client.post(url.as_str()).json(&body);
        if let Some(ref key) = self.config.api_key {
            builder = builder.header(self.config.api_key_header.as_str(), key);
        }

        debug!(
            target: "narrate.synth",
            voice = %request.voice.voice_id,
            chars = request.text.len(),
            context_ids = request.previous_request_ids.len(),
            "Sending synthesis request"
        );

        let response = builder
            .send()
            .await
            .map_err(|e| SynthesisError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SynthesisError::upstream(
                Some(status.as_u16()),
                error_message(&text),
            ));
        }

        let request_id = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let pcm = response
            .bytes()
            .await
            .map_err(|e| SynthesisError::Transport(e.to_string()))?;
        if pcm.is_empty() {
            return Err(SynthesisError::InvalidResponse("empty audio body".to_string()));
        }

        let audio = PcmBuffer::from_pcm16_le(&pcm, request.sample_rate, 1)
            .and_then(|buf| buf.to_wav())
            .map_err(|e| SynthesisError::InvalidResponse(e.to_string()))?;

        Ok(SynthesisResponse { audio, request_id })
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use narrate_core::VoiceSettings;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    fn request() -> SynthesisRequest {
        SynthesisRequest {
            text: "Hello <break time=\"300ms\"/> world.".to_string(),
            voice: VoiceSettings::default(),
            sample_rate: 16_000,
            previous_text: Some("before".to_string()),
            next_text: None,
            previous_request_ids: vec!["req-1".to_string()],
        }
    }

    /// Serve one canned HTTP response and hand back the raw request.
    async fn serve_once(
        status: &'static str,
        headers: &'static str,
        body: Vec<u8>,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw).to_string();
                if let Some(split) = text.find("\r\n\r\n") {
                    let length = text[..split]
                        .lines()
                        .find_map(|l| {
                            let lower = l.to_ascii_lowercase();
                            lower
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if raw.len() >= split + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let head = format!(
                "HTTP/1.1 {status}\r\n{headers}content-length: {}\r\nconnection: close\r\n\r\n",
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(&body).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&raw).to_string()
        });
        (format!("http://{addr}"), handle)
    }

    #[test]
    fn test_endpoint_shape() {
        let engine =
            HttpSynthesisEngine::new(SynthConfig::new().with_base_url("http://localhost:9000/tts"))
                .unwrap();
        let url = engine.endpoint("narrator", 44_100).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:9000/tts/v1/text-to-speech/narrator?output_format=pcm_44100"
        );
    }

    #[test]
    fn test_body_omits_empty_context() {
        let mut req = request();
        req.previous_text = None;
        req.previous_request_ids.clear();
        let json = serde_json::to_value(SynthesisBody::from(&req)).unwrap();
        assert!(json.get("previous_text").is_none());
        assert!(json.get("previous_request_ids").is_none());
        assert_eq!(json["model_id"], "multilingual-v2");
        assert_eq!(json["voice_settings"]["use_speaker_boost"], true);
    }

    #[test]
    fn test_error_message_shapes() {
        assert_eq!(
            error_message(r#"{"detail":{"status":"quota_exceeded","message":"Out of credits"}}"#),
            "Out of credits"
        );
        assert_eq!(error_message(r#"{"detail":"Voice not found"}"#), "Voice not found");
        assert_eq!(error_message("  bad gateway "), "bad gateway");
        assert_eq!(error_message(""), "empty response body");
    }

    #[tokio::test]
    async fn test_successful_call_wraps_pcm_in_wav() {
        let pcm: Vec<u8> = [0i16, 8_192, -8_192, 0]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let (base, server) = serve_once("200 OK", "request-id: abc123\r\n", pcm).await;

        let engine = HttpSynthesisEngine::new(
            SynthConfig::new().with_base_url(base).with_api_key("k-1"),
        )
        .unwrap();
        let response = engine.synthesize(&request()).await.unwrap();
        assert_eq!(response.request_id.as_deref(), Some("abc123"));

        let wav = PcmBuffer::from_wav(&response.audio).unwrap();
        assert_eq!(wav.sample_rate(), 16_000);
        assert_eq!(wav.frames(), 4);

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /v1/text-to-speech/narrator?output_format=pcm_16000"));
        assert!(raw.to_ascii_lowercase().contains("xi-api-key: k-1"));
        assert!(raw.contains("\"previous_request_ids\":[\"req-1\"]"));
        assert!(raw.contains("\"previous_text\":\"before\""));
    }

    #[tokio::test]
    async fn test_upstream_error_preserves_status_and_message() {
        let (base, _server) = serve_once(
            "429 Too Many Requests",
            "content-type: application/json\r\n",
            br#"{"detail":{"message":"Too many concurrent requests"}}"#.to_vec(),
        )
        .await;
        let engine = HttpSynthesisEngine::new(SynthConfig::new().with_base_url(base)).unwrap();
        let err = engine.synthesize(&request()).await.unwrap_err();
        assert_eq!(
            err,
            SynthesisError::upstream(Some(429), "Too many concurrent requests")
        );
    }
}
