use std::fs;
use std::time::Duration;
use tempfile::TempDir;

use vidseek_core::traits::Segmenter;
use vidseek_transcribe::command::parse_transcriber_output;
use vidseek_transcribe::{parse_subtitles, CommandSegmenter, SidecarSegmenter, SubtitleFormat};

const SRT: &str = "1\r\n00:00:01,000 --> 00:00:03,500\r\nHello <i>there</i>\r\nsecond line\r\n\r\n2\r\n00:00:04,000 --> 00:00:05,000\r\n\r\n3\r\n00:01:00,250 --> 00:01:02,000\r\nLast cue\r\n";

const VTT: &str = "WEBVTT - sample\n\nNOTE a comment\nspanning lines\n\nintro\n00:01.000 --> 00:02.500 align:start position:10%\n<v Speaker>Welcome</v>\n\n01:00:00.000 --> 01:00:01.000\nAn hour in\n";

#[test]
fn srt_cues_in_order_with_joined_text() {
    let spans = parse_subtitles(SRT, SubtitleFormat::Srt).expect("parse");
    assert_eq!(spans.len(), 3);
    assert_eq!(spans[0].text, "Hello there second line");
    assert_eq!((spans[0].start, spans[0].end), (1.0, 3.5));
    assert_eq!(spans[1].text, "", "empty cues are kept for the coordinator to drop");
    assert_eq!(spans[2].start, 60.25);
}

#[test]
fn vtt_skips_header_and_notes() {
    let spans = parse_subtitles(VTT, SubtitleFormat::Vtt).expect("parse");
    assert_eq!(spans.len(), 2);
    assert_eq!(spans[0].text, "Welcome");
    assert_eq!((spans[0].start, spans[0].end), (1.0, 2.5));
    assert_eq!(spans[1].start, 3600.0);

    assert!(parse_subtitles("00:01.000 --> 00:02.000\nhi", SubtitleFormat::Vtt).is_err());
}

#[tokio::test]
async fn sidecar_reads_subtitles_next_to_video() {
    let tmp = TempDir::new().unwrap();
    let video = tmp.path().join("talk.mp4");
    fs::write(&video, b"").unwrap();
    fs::write(tmp.path().join("talk.srt"), SRT).unwrap();

    let spans = SidecarSegmenter::new().transcribe(&video).await.expect("transcribe");
    assert_eq!(spans.len(), 3);

    let lonely = tmp.path().join("lonely.mkv");
    fs::write(&lonely, b"").unwrap();
    let err = SidecarSegmenter::new().transcribe(&lonely).await.unwrap_err();
    assert!(err.to_string().contains("no .srt or .vtt"));
}

#[test]
fn transcriber_output_shapes() {
    let flat = br#"[{"text": " hi ", "start": 0.0, "end": 1.5}]"#;
    let spans = parse_transcriber_output(flat).expect("flat");
    assert_eq!(spans[0].text, " hi ");

    let whisper = br#"{"text": "hi there", "language": "en",
        "segments": [{"id": 0, "seek": 0, "text": "hi", "start": 0.0, "end": 1.0, "tokens": [1, 2]},
                     {"id": 1, "seek": 0, "text": "there", "start": 1.0, "end": 2.0, "tokens": [3]}]}"#;
    let spans = parse_transcriber_output(whisper).expect("whisper");
    assert_eq!(spans.len(), 2);
    assert_eq!(spans[1].end, 2.0);

    assert!(parse_transcriber_output(b"not json").is_err());
}

#[cfg(unix)]
#[tokio::test]
async fn command_segmenter_runs_program_with_video_path() {
    let tmp = TempDir::new().unwrap();
    let video = tmp.path().join("clip.mp4");
    fs::write(&video, br#"{"segments": [{"text": "from file", "start": 2.0, "end": 4.0}]}"#).unwrap();

    // `sh -c 'cat "$0"' <video>` prints the file we wrote above.
    let segmenter = CommandSegmenter::new("sh", vec!["-c".into(), "cat \"$0\"".into()], Duration::from_secs(10));
    let spans = segmenter.transcribe(&video).await.expect("transcribe");
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].text, "from file");
}

#[cfg(unix)]
#[tokio::test]
async fn command_segmenter_reports_failures() {
    let tmp = TempDir::new().unwrap();
    let video = tmp.path().join("clip.mp4");
    fs::write(&video, b"").unwrap();

    let failing = CommandSegmenter::new("sh", vec!["-c".into(), "echo boom >&2; exit 3".into()], Duration::from_secs(10));
    let err = failing.transcribe(&video).await.unwrap_err();
    assert!(err.to_string().contains("exited with 3"), "{err}");
    assert!(err.to_string().contains("boom"));

    let slow = CommandSegmenter::new("sh", vec!["-c".into(), "sleep 5".into()], Duration::from_millis(200));
    let err = slow.transcribe(&video).await.unwrap_err();
    assert!(err.to_string().contains("timed out"), "{err}");

    let missing = CommandSegmenter::new("/nonexistent/transcriber", vec![], Duration::from_secs(1));
    assert!(missing.transcribe(&video).await.is_err());
}

#[cfg(unix)]
#[tokio::test]
async fn oversized_transcriber_output_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let video = tmp.path().join("clip.mp4");
    fs::write(&video, b"").unwrap();

    for script in ["head -c 11000000 /dev/zero", "head -c 11000000 /dev/zero; exit 2"] {
        let chatty = CommandSegmenter::new("sh", vec!["-c".into(), script.into()], Duration::from_secs(30));
        let err = chatty.transcribe(&video).await.unwrap_err();
        assert!(err.to_string().contains("transcriber output exceeds 10 MiB"), "{script}: {err}");
    }

    // Exactly at the cap is still read in full and parsed.
    let at_cap = CommandSegmenter::new("sh", vec!["-c".into(), "head -c 10485760 /dev/zero".into()], Duration::from_secs(30));
    let err = at_cap.transcribe(&video).await.unwrap_err();
    assert!(err.to_string().contains("unparsable"), "{err}");
}
