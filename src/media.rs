use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tracing::warn;

use crate::error::BridgeError;
use crate::tempfiles::{remove_temp_file, TempFileLedger};

/// Transport ceiling on outbound media (~64 MB).
pub const MAX_FILE_SIZE: u64 = 64 * 1024 * 1024;

const ALLOWED_MIME_VIDEO: &[&str] = &["video/mp4", "application/mp4", "video/3gp", "video/3gpp"];
const ALLOWED_MIME_AUDIO: &[&str] = &[
    "audio/mpeg",
    "audio/mp3",
    "audio/aac",
    "audio/x-aac",
    "audio/mp4",
    "audio/3gpp",
    "audio/3gpp2",
    "audio/ogg",
    "audio/opus",
];
const ALLOWED_MIME_DOC: &[&str] = &["application/pdf"];

const RAW_WAVEFORM_MIMES: &[&str] = &["audio/wav", "audio/x-wav", "audio/wave"];

/// MIME type from the file extension. Unknown extensions yield `None`.
pub fn mime_type_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "mp4" => "video/mp4",
        "m4p" => "application/mp4",
        "webm" => "video/webm",
        "3gp" | "3gpp" => "video/3gpp",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mp3" => "audio/mpeg",
        "aac" => "audio/aac",
        "m4a" => "audio/mp4",
        "ogg" => "audio/ogg",
        "opus" => "audio/opus",
        "wav" => "audio/wav",
        "pdf" => "application/pdf",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "txt" => "text/plain",
        _ => return None,
    };
    Some(mime)
}

fn is_allowed(mime: &str) -> bool {
    if mime.starts_with("video/") {
        ALLOWED_MIME_VIDEO.contains(&mime)
    } else if mime.starts_with("audio/") {
        ALLOWED_MIME_AUDIO.contains(&mime)
    } else {
        ALLOWED_MIME_DOC.contains(&mime)
    }
}

/// Fixed recipe for one conversion step.
#[derive(Debug, Clone)]
pub struct ConversionSpec {
    pub output_ext: &'static str,
    pub video_codec: Option<&'static str>,
    pub audio_codec: Option<&'static str>,
    pub format: &'static str,
    pub extra_args: &'static [&'static str],
}

/// webm → broadly compatible mp4 (H.264/AAC, fast-start, standard pixel format).
const WEBM_TO_MP4: ConversionSpec = ConversionSpec {
    output_ext: "mp4",
    video_codec: Some("libx264"),
    audio_codec: Some("aac"),
    format: "mp4",
    extra_args: &["-movflags", "+faststart", "-pix_fmt", "yuv420p"],
};

/// Raw waveform audio → mp3.
const WAV_TO_MP3: ConversionSpec = ConversionSpec {
    output_ext: "mp3",
    video_codec: None,
    audio_codec: Some("libmp3lame"),
    format: "mp3",
    extra_args: &[],
};

/// External transcoding capability. The output path is chosen by the caller;
/// implementations write exactly there and leave the input untouched.
#[async_trait::async_trait]
pub trait Transcoder: Send + Sync {
    async fn convert(
        &self,
        input: &Path,
        output: &Path,
        spec: &ConversionSpec,
    ) -> Result<(), BridgeError>;
}

pub struct FfmpegTranscoder {
    program: String,
    timeout: Duration,
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

#[async_trait::async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn convert(
        &self,
        input: &Path,
        output: &Path,
        spec: &ConversionSpec,
    ) -> Result<(), BridgeError> {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(["-hide_banner", "-loglevel", "error", "-y", "-i"])
            .arg(input);
        if let Some(codec) = spec.video_codec {
            cmd.args(["-c:v", codec]);
        }
        if let Some(codec) = spec.audio_codec {
            cmd.args(["-c:a", codec]);
        }
        cmd.args(spec.extra_args);
        cmd.args(["-f", spec.format]).arg(output);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| BridgeError::Conversion(format!("failed to spawn {}: {e}", self.program)))?;

        let mut stderr_pipe = child.stderr.take();
        let drain = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(stderr) = stderr_pipe.as_mut() {
                let _ = stderr.read_to_end(&mut buf).await;
            }
            buf
        });

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(res) => res?,
            Err(_) => {
                let _ = child.kill().await;
                return Err(BridgeError::Conversion(format!(
                    "{} timed out after {:?}",
                    self.program, self.timeout
                )));
            }
        };

        if !status.success() {
            let stderr = drain.await.unwrap_or_default();
            return Err(BridgeError::Conversion(format!(
                "{} exited with {status}: {}",
                self.program,
                String::from_utf8_lossy(&stderr).trim()
            )));
        }
        Ok(())
    }
}

/// A validated, send-ready media file plus the intermediate files produced
/// while making it sendable. The caller owns the artifact and must reclaim
/// the temp files exactly once via [`MediaArtifact::cleanup`].
#[derive(Debug)]
pub struct MediaArtifact {
    pub path: PathBuf,
    pub mime_type: String,
    pub temp_files: Vec<PathBuf>,
}

impl MediaArtifact {
    /// Delete every temp file still on disk and release it from the ledger.
    /// Deletion failures are logged, never raised.
    pub async fn cleanup(self, ledger: &TempFileLedger) {
        cleanup_paths(&self.temp_files, ledger).await;
    }
}

async fn cleanup_paths(paths: &[PathBuf], ledger: &TempFileLedger) {
    for path in paths {
        remove_temp_file(path).await;
        ledger.release(path);
    }
}

/// Inspect, convert if needed, and validate a media file for sending.
///
/// Conversion outputs land next to the input with the original base name and
/// the new extension, are registered with the ledger while in flight, and are
/// reclaimed here on every rejection path. The original input is never
/// deleted.
pub async fn sanitize_media(
    transcoder: &dyn Transcoder,
    ledger: &TempFileLedger,
    path: &Path,
) -> Result<MediaArtifact, BridgeError> {
    let Some(mut mime_type) = mime_type_for_path(path) else {
        return Err(BridgeError::UnsupportedMedia(format!(
            "unknown media type: {}",
            path.display()
        )));
    };

    let mut file = path.to_path_buf();
    let mut temp_files: Vec<PathBuf> = Vec::new();

    if mime_type == "video/webm" {
        file = convert_step(transcoder, ledger, &file, &WEBM_TO_MP4, &mut temp_files).await?;
        mime_type = "video/mp4";
    }

    if RAW_WAVEFORM_MIMES.contains(&mime_type) {
        file = convert_step(transcoder, ledger, &file, &WAV_TO_MP3, &mut temp_files).await?;
        mime_type = "audio/mpeg";
    }

    // Ambiguous container type: treat as its video-specific equivalent.
    if mime_type == "application/mp4" {
        mime_type = "video/mp4";
    }

    if !is_allowed(mime_type) {
        cleanup_paths(&temp_files, ledger).await;
        return Err(BridgeError::UnsupportedMedia(mime_type.to_string()));
    }

    let size = tokio::fs::metadata(&file).await?.len();
    if size > MAX_FILE_SIZE {
        warn!(
            "File too large for transport: {:.2}MB ({})",
            size as f64 / (1024.0 * 1024.0),
            file.display()
        );
        cleanup_paths(&temp_files, ledger).await;
        return Err(BridgeError::UnsupportedMedia(format!(
            "file exceeds size ceiling: {size} bytes"
        )));
    }

    Ok(MediaArtifact {
        path: file,
        mime_type: mime_type.to_string(),
        temp_files,
    })
}

async fn convert_step(
    transcoder: &dyn Transcoder,
    ledger: &TempFileLedger,
    input: &Path,
    spec: &ConversionSpec,
    temp_files: &mut Vec<PathBuf>,
) -> Result<PathBuf, BridgeError> {
    let output = input.with_extension(spec.output_ext);
    ledger.register(&output);

    match transcoder.convert(input, &output, spec).await {
        Ok(()) => {
            temp_files.push(output.clone());
            Ok(output)
        }
        Err(e) => {
            // Discard any partial output along with earlier intermediates.
            remove_temp_file(&output).await;
            ledger.release(&output);
            cleanup_paths(temp_files, ledger).await;
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CopyTranscoder;

    #[async_trait::async_trait]
    impl Transcoder for CopyTranscoder {
        async fn convert(
            &self,
            input: &Path,
            output: &Path,
            _spec: &ConversionSpec,
        ) -> Result<(), BridgeError> {
            tokio::fs::copy(input, output).await?;
            Ok(())
        }
    }

    struct FailingTranscoder;

    #[async_trait::async_trait]
    impl Transcoder for FailingTranscoder {
        async fn convert(
            &self,
            _input: &Path,
            output: &Path,
            _spec: &ConversionSpec,
        ) -> Result<(), BridgeError> {
            // Leave a partial file behind to exercise the discard path.
            tokio::fs::write(output, b"partial").await?;
            Err(BridgeError::Conversion("encoder blew up".into()))
        }
    }

    fn test_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("msgbridge_media_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_mime_type_for_path() {
        assert_eq!(
            mime_type_for_path(Path::new("/tmp/clip.webm")),
            Some("video/webm")
        );
        assert_eq!(
            mime_type_for_path(Path::new("/tmp/voice.WAV")),
            Some("audio/wav")
        );
        assert_eq!(
            mime_type_for_path(Path::new("/tmp/report.pdf")),
            Some("application/pdf")
        );
        assert_eq!(mime_type_for_path(Path::new("/tmp/noext")), None);
        assert_eq!(mime_type_for_path(Path::new("/tmp/data.xyz")), None);
    }

    #[test]
    fn test_allow_lists() {
        assert!(is_allowed("video/mp4"));
        assert!(is_allowed("audio/ogg"));
        assert!(is_allowed("application/pdf"));
        assert!(!is_allowed("video/quicktime"));
        assert!(!is_allowed("audio/wav"));
        assert!(!is_allowed("image/png"));
        assert!(!is_allowed("text/plain"));
    }

    #[tokio::test]
    async fn test_sanitize_unknown_type_rejected_without_side_effects() {
        let dir = test_dir();
        let input = dir.join("blob.xyz");
        std::fs::write(&input, b"data").unwrap();

        let ledger = TempFileLedger::new();
        let err = sanitize_media(&CopyTranscoder, &ledger, &input)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "unsupported_media");
        assert_eq!(ledger.tracked(), 0);
        assert!(input.exists());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_sanitize_converts_webm_to_mp4() {
        let dir = test_dir();
        let input = dir.join("clip.webm");
        std::fs::write(&input, b"webm-bytes").unwrap();

        let ledger = TempFileLedger::new();
        let artifact = sanitize_media(&CopyTranscoder, &ledger, &input)
            .await
            .unwrap();
        assert_eq!(artifact.mime_type, "video/mp4");
        assert_eq!(artifact.path, dir.join("clip.mp4"));
        assert_eq!(artifact.temp_files, vec![dir.join("clip.mp4")]);
        assert!(input.exists());

        artifact.cleanup(&ledger).await;
        assert!(!dir.join("clip.mp4").exists());
        assert_eq!(ledger.tracked(), 0);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_sanitize_converts_wav_to_mp3() {
        let dir = test_dir();
        let input = dir.join("note.wav");
        std::fs::write(&input, b"wav-bytes").unwrap();

        let ledger = TempFileLedger::new();
        let artifact = sanitize_media(&CopyTranscoder, &ledger, &input)
            .await
            .unwrap();
        assert_eq!(artifact.mime_type, "audio/mpeg");
        assert_eq!(artifact.path, dir.join("note.mp3"));
        assert!(input.exists());

        artifact.cleanup(&ledger).await;
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_sanitize_conversion_failure_discards_partial_output() {
        let dir = test_dir();
        let input = dir.join("clip.webm");
        std::fs::write(&input, b"webm-bytes").unwrap();

        let ledger = TempFileLedger::new();
        let err = sanitize_media(&FailingTranscoder, &ledger, &input)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "conversion_failed");
        assert!(!dir.join("clip.mp4").exists());
        assert_eq!(ledger.tracked(), 0);
        assert!(input.exists());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_sanitize_normalizes_ambiguous_container() {
        let dir = test_dir();
        let input = dir.join("song.m4p");
        std::fs::write(&input, b"bytes").unwrap();

        let ledger = TempFileLedger::new();
        let artifact = sanitize_media(&CopyTranscoder, &ledger, &input)
            .await
            .unwrap();
        assert_eq!(artifact.mime_type, "video/mp4");
        assert!(artifact.temp_files.is_empty());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_sanitize_passes_pdf_through() {
        let dir = test_dir();
        let input = dir.join("report.pdf");
        std::fs::write(&input, b"%PDF-1.7").unwrap();

        let ledger = TempFileLedger::new();
        let artifact = sanitize_media(&CopyTranscoder, &ledger, &input)
            .await
            .unwrap();
        assert_eq!(artifact.mime_type, "application/pdf");
        assert_eq!(artifact.path, input);
        assert!(artifact.temp_files.is_empty());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_sanitize_rejects_oversized_file_after_type_check() {
        let dir = test_dir();
        let input = dir.join("huge.mp4");
        let f = std::fs::File::create(&input).unwrap();
        f.set_len(MAX_FILE_SIZE + 1).unwrap();

        let ledger = TempFileLedger::new();
        let err = sanitize_media(&CopyTranscoder, &ledger, &input)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "unsupported_media");
        assert!(input.exists());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_sanitize_rejects_oversized_conversion_output_and_cleans_it() {
        struct BloatingTranscoder;

        #[async_trait::async_trait]
        impl Transcoder for BloatingTranscoder {
            async fn convert(
                &self,
                _input: &Path,
                output: &Path,
                _spec: &ConversionSpec,
            ) -> Result<(), BridgeError> {
                let f = std::fs::File::create(output)?;
                f.set_len(MAX_FILE_SIZE + 1)?;
                Ok(())
            }
        }

        let dir = test_dir();
        let input = dir.join("note.wav");
        std::fs::write(&input, b"wav-bytes").unwrap();

        let ledger = TempFileLedger::new();
        let err = sanitize_media(&BloatingTranscoder, &ledger, &input)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "unsupported_media");
        assert!(!dir.join("note.mp3").exists());
        assert_eq!(ledger.tracked(), 0);
        assert!(input.exists());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_sanitize_rejects_disallowed_video_type() {
        let dir = test_dir();
        let input = dir.join("clip.mov");
        std::fs::write(&input, b"bytes").unwrap();

        let ledger = TempFileLedger::new();
        let err = sanitize_media(&CopyTranscoder, &ledger, &input)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "unsupported_media");
        let _ = std::fs::remove_dir_all(dir);
    }
}
