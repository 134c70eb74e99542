use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use tracing::debug;

use super::{SpeechBackend, SpeechError};
use crate::{audio::AudioBuffer, config::SpeechConfig};

const NAME: &str = "VOICEVOX";

/// VOICEVOX engine reached over its local HTTP API.
///
/// Synthesis is two calls: `audio_query` builds a query for the text, then
/// `synthesis` renders that query (with `speedScale` set) to WAV.
pub struct Voicevox {
    client: reqwest::Client,
    base_url: String,
    speaker: u32,
}

impl Voicevox {
    pub fn new(base_url: impl Into<String>, speaker: u32) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            speaker,
        }
    }

    pub fn from_config(config: &SpeechConfig) -> Self {
        Self::new(config.voicevox_url.clone(), config.speaker)
    }

    async fn audio_query(&self, text: &str) -> Result<Value, SpeechError> {
        let response = self
            .client
            .post(format!("{}/audio_query", self.base_url))
            .query(&[("speaker", self.speaker.to_string()), ("text", text.to_string())])
            .send()
            .await
            .map_err(request_error)?
            .error_for_status()
            .map_err(request_error)?;

        response.json::<Value>().await.map_err(request_error)
    }

    async fn render(&self, query: &Value) -> Result<Vec<u8>, SpeechError> {
        let response = self
            .client
            .post(format!("{}/synthesis", self.base_url))
            .query(&[("speaker", self.speaker)])
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "audio/wav")
            .body(serde_json::to_vec(query)?)
            .send()
            .await
            .map_err(request_error)?
            .error_for_status()
            .map_err(request_error)?;

        let bytes = response.bytes().await.map_err(request_error)?;
        Ok(bytes.to_vec())
    }
}

/// Connection failures mean the engine is not running; anything else is a
/// real failure.
fn request_error(e: reqwest::Error) -> SpeechError {
    if e.is_connect() {
        SpeechError::Unavailable {
            backend: NAME,
            reason: e.to_string(),
        }
    } else {
        SpeechError::Backend {
            backend: NAME,
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl SpeechBackend for Voicevox {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn synthesize(&self, text: &str, rate: f64) -> Result<AudioBuffer, SpeechError> {
        let mut query = self.audio_query(text).await?;
        let Some(fields) = query.as_object_mut() else {
            return Err(SpeechError::Backend {
                backend: NAME,
                reason: format!("audio_query returned a non-object: {query}"),
            });
        };
        fields.insert("speedScale".to_string(), Value::from(rate));

        let wav = self.render(&query).await?;
        let clip = AudioBuffer::from_wav_bytes(&wav)?;
        debug!(rate, duration = clip.duration_secs(), "voicevox clip ready");
        Ok(clip)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_partial_json, header, method, path, query_param},
    };

    use super::*;

    fn wav_bytes(seconds: f64) -> Vec<u8> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("speech.wav");
        AudioBuffer::silent(seconds, 24000, 1).write_wav(&path).unwrap();
        std::fs::read(path).unwrap()
    }

    #[tokio::test]
    async fn query_then_synthesis_with_speed_scale() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/audio_query"))
            .and(query_param("speaker", "3"))
            .and(query_param("text", "こんにちは 世界"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "speedScale": 1.0, "pitchScale": 0.0 })),
            )
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/synthesis"))
            .and(query_param("speaker", "3"))
            .and(header("content-type", "application/json"))
            .and(header("accept", "audio/wav"))
            .and(body_partial_json(json!({ "speedScale": 1.4, "pitchScale": 0.0 })))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(wav_bytes(0.5)))
            .expect(1)
            .mount(&server)
            .await;

        let engine = Voicevox::new(server.uri(), 3);
        let clip = engine.synthesize("こんにちは 世界", 1.4).await.unwrap();
        assert_eq!(clip.sample_rate, 24000);
        assert!((clip.duration_secs() - 0.5).abs() < 1e-3);
    }

    #[tokio::test]
    async fn http_error_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio_query"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let engine = Voicevox::new(server.uri(), 0);
        let err = engine.synthesize("x", 1.0).await.unwrap_err();
        assert!(matches!(err, SpeechError::Backend { backend: NAME, .. }));
    }

    #[tokio::test]
    async fn refused_connection_is_unavailable() {
        let engine = Voicevox::new("http://127.0.0.1:9", 0);
        let err = engine.synthesize("x", 1.0).await.unwrap_err();
        assert!(matches!(err, SpeechError::Unavailable { backend: NAME, .. }));
    }
}
