/*!
 * End-to-end batch tests: merge, remove and extract through the controller
 */

use anyhow::Result;
use encoding_rs::UTF_8;
use std::fs;
use std::path::PathBuf;
use mkvbatch::app_config::{BatchRequest, SanitizerConfig, Settings};
use mkvbatch::app_controller::BatchStatus;
use mkvbatch::language_utils::LanguageSelection;
use mkvbatch::progress::ProgressEvent;
use mkvbatch::subtitle_sanitizer::SubtitleSanitizer;
use crate::common;
use crate::common::mock_tools::{FakeRunner, FixedDetector, MUXED_CONTENT};

#[tokio::test]
async fn test_process_batch_withOnePair_shouldMergeIntoOutputDirectory() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = temp_dir.path().join("I");
    let output = temp_dir.path().join("O");
    let video = common::create_test_video(&input, "movie.mp4")?;
    let subtitle = common::create_test_subtitle(&input, "movie.srt")?;
    let harness = common::create_test_controller(FakeRunner::new());

    let request = BatchRequest::new(&input, &output, Settings::default());
    let response = harness.controller.process_batch(&request).await;

    assert_eq!(response.status, BatchStatus::Complete);
    assert!(response.warning.is_none());
    assert!(response.error.is_none());
    assert_eq!(fs::read_to_string(output.join("movie.mkv"))?, MUXED_CONTENT);
    // Originals are kept without remove-old
    assert!(video.exists());
    assert!(subtitle.exists());

    let invocations = harness.runner.invocations();
    assert_eq!(invocations.len(), 1);
    let args = invocations[0].args_lossy();
    assert_eq!(args[0], "-o");
    assert_eq!(PathBuf::from(&args[1]), output.join("movie.mkv"));
    assert_eq!(PathBuf::from(&args[2]), video);
    assert!(args.contains(&"0:eng".to_string()));
    assert!(args.contains(&"0:English".to_string()));
    assert_eq!(PathBuf::from(args.last().unwrap()), subtitle);

    assert_eq!(
        harness.progress.events(),
        vec![
            ProgressEvent::BatchSize(1),
            ProgressEvent::ProcessingNext { index: 0, video: video.clone() },
            ProgressEvent::Finished,
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_process_batch_withExistingOutput_shouldDisambiguateName() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = temp_dir.path().join("I");
    let output = temp_dir.path().join("O");
    common::create_test_video(&input, "movie.mp4")?;
    common::create_test_subtitle(&input, "movie.srt")?;
    common::create_test_file(&output, "movie.mkv", "previous run")?;
    let harness = common::create_test_controller(FakeRunner::new());

    let response = harness
        .controller
        .process_batch(&BatchRequest::new(&input, &output, Settings::default()))
        .await;

    assert_eq!(response.status, BatchStatus::Complete);
    assert_eq!(fs::read_to_string(output.join("movie.mkv"))?, "previous run");
    assert_eq!(fs::read_to_string(output.join("movie (1).mkv"))?, MUXED_CONTENT);
    assert_eq!(response.outcomes[0].output, Some(output.join("movie (1).mkv")));
    Ok(())
}

#[tokio::test]
async fn test_process_batch_withRemoveSubtitles_shouldCopyEveryVideoWithoutTracks() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = temp_dir.path().join("I");
    let output = temp_dir.path().join("O");
    common::create_test_video(&input, "a.mkv")?;
    common::create_test_video(&input, "b.mkv")?;
    common::create_test_subtitle(&input, "a.srt")?;
    let harness = common::create_test_controller(FakeRunner::new());
    let settings = Settings {
        remove_subtitles: true,
        extract_subtitles: true,
        ..Settings::default()
    };

    let response = harness
        .controller
        .process_batch(&BatchRequest::new(&input, &output, settings))
        .await;

    assert_eq!(response.status, BatchStatus::Complete);
    assert!(output.join("a.mkv").exists());
    assert!(output.join("b.mkv").exists());
    let invocations = harness.runner.invocations();
    assert_eq!(invocations.len(), 2);
    for invocation in &invocations {
        assert_eq!(invocation.program, "mkvmerge");
        assert!(invocation.args_lossy().contains(&"--no-subtitles".to_string()));
        assert!(!invocation.args_lossy().iter().any(|a| a.ends_with(".srt")));
    }
    assert_eq!(harness.progress.processing_count(), 2);
    Ok(())
}

#[tokio::test]
async fn test_process_batch_withEmptyDirectory_shouldReportErrorAndCreateNothing() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = temp_dir.path().join("I");
    fs::create_dir_all(&input)?;
    let output = temp_dir.path().join("O");
    let harness = common::create_test_controller(FakeRunner::new());

    let response = harness
        .controller
        .process_batch(&BatchRequest::new(&input, &output, Settings::default()))
        .await;

    assert_eq!(response.status, BatchStatus::Error);
    assert_eq!(
        response.error.as_deref(),
        Some("No valid files were found in the source directory provided.")
    );
    assert!(!output.exists());
    assert!(harness.runner.invocations().is_empty());
    assert_eq!(harness.progress.processing_count(), 0);

    let json = serde_json::to_value(&response)?;
    assert_eq!(json["status"], "Error");
    Ok(())
}

#[tokio::test]
async fn test_process_batch_withMissingInput_shouldLogTerminalError() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let error_log = temp_dir.path().join("logs").join("error.log");
    let harness = common::create_test_controller(FakeRunner::new());
    let controller = harness.controller.with_error_log(error_log.clone());

    let response = controller
        .process_batch(&BatchRequest::new(temp_dir.path().join("missing"), temp_dir.path().join("O"), Settings::default()))
        .await;

    assert_eq!(response.status, BatchStatus::Error);
    let logged = fs::read_to_string(&error_log)?;
    assert!(logged.contains("missing"));
    Ok(())
}

#[tokio::test]
async fn test_process_batch_withoutOutputDirectory_shouldRejectRequest() {
    let harness = common::create_test_controller(FakeRunner::new());

    let response = harness
        .controller
        .process_batch(&BatchRequest::new("/somewhere", "", Settings::default()))
        .await;

    assert_eq!(response.status, BatchStatus::Error);
    assert!(response.error.unwrap().contains("Output directory"));
    assert!(harness.progress.events().is_empty());
}

#[tokio::test]
async fn test_process_batch_withOneFailingPair_shouldContinueAndWarn() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = temp_dir.path().join("I");
    let output = temp_dir.path().join("O");
    for stem in ["a", "b", "c"] {
        common::create_test_video(&input, &format!("{}.mp4", stem))?;
        common::create_test_subtitle(&input, &format!("{}.srt", stem))?;
    }
    let harness = common::create_test_controller(FakeRunner::new().with_failing_input("b.mp4"));

    let response = harness
        .controller
        .process_batch(&BatchRequest::new(&input, &output, Settings::default()))
        .await;

    assert_eq!(response.status, BatchStatus::Warning);
    assert_eq!(response.failures.len(), 1);
    assert_eq!(response.failures[0].video, input.join("b.mp4"));
    assert!(response.warning.unwrap().contains("1 of 3"));
    assert!(output.join("a.mkv").exists());
    assert!(!output.join("b.mkv").exists());
    assert!(output.join("c.mkv").exists());
    assert_eq!(harness.progress.processing_count(), 3);
    Ok(())
}

#[tokio::test]
async fn test_process_batch_withRememberOutputDir_shouldMirrorInputTree() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = temp_dir.path().join("I");
    let output = temp_dir.path().join("O");
    common::create_test_video(&input, "Show/S01/ep1.mp4")?;
    common::create_test_subtitle(&input, "Show/S01/ep1.srt")?;
    common::create_test_video(&input, "film.avi")?;
    common::create_test_subtitle(&input, "film.srt")?;
    let harness = common::create_test_controller(FakeRunner::new());
    let settings = Settings {
        remember_output_dir: true,
        ..Settings::default()
    };

    let response = harness
        .controller
        .process_batch(&BatchRequest::new(&input, &output, settings))
        .await;

    assert_eq!(response.status, BatchStatus::Complete);
    assert_eq!(
        common::list_files(&output),
        vec![PathBuf::from("Show/S01/ep1.mkv"), PathBuf::from("film.mkv")]
    );
    Ok(())
}

#[tokio::test]
async fn test_process_batch_withLanguageSuffixes_shouldTagTracksAndFlagPrimary() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = temp_dir.path().join("I");
    let output = temp_dir.path().join("O");
    common::create_test_video(&input, "movie.mkv")?;
    common::create_test_subtitle(&input, "movie.en.srt")?;
    common::create_test_subtitle(&input, "movie.fr.srt")?;
    let harness = common::create_test_controller(FakeRunner::new());
    let settings = Settings {
        language: LanguageSelection {
            code: "fre".to_string(),
            text: String::new(),
        },
        ..Settings::default()
    };

    let response = harness
        .controller
        .process_batch(&BatchRequest::new(&input, &output, settings))
        .await;

    assert_eq!(response.status, BatchStatus::Complete);
    let args = harness.runner.invocations()[0].args_lossy();
    let english = args.iter().position(|a| a == "0:eng").unwrap();
    let french = args.iter().position(|a| a == "0:fra").unwrap();
    let flag = args.iter().position(|a| a == "--default-track-flag").unwrap();
    assert!(english < french);
    assert!(french < flag);
    assert!(args.contains(&"0:French".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_process_batch_withRemoveAds_shouldSanitizeBeforeMerging() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = temp_dir.path().join("I");
    let output = temp_dir.path().join("O");
    common::create_test_video(&input, "movie.mp4")?;
    let subtitle = common::create_test_file(
        &input,
        "movie.srt",
        b"1\n00:00:01,000 --> 00:00:02,000\nCaf\xE9 au lait\n\n2\n00:00:03,000 --> 00:00:04,000\nwww.OpenSubtitles.org\n",
    )?;
    let harness = common::create_test_controller(FakeRunner::new());
    let settings = Settings {
        remove_ads: true,
        ..Settings::default()
    };

    let response = harness
        .controller
        .process_batch(&BatchRequest::new(&input, &output, settings))
        .await;

    assert_eq!(response.status, BatchStatus::Complete);
    let content = fs::read_to_string(&subtitle)?;
    assert!(!content.to_lowercase().contains("opensubtitles"));
    assert_eq!(content.lines().count(), 7);
    Ok(())
}

#[tokio::test]
async fn test_process_batch_withUndecodableSubtitle_shouldFailOnlyThatPair() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = temp_dir.path().join("I");
    let output = temp_dir.path().join("O");
    common::create_test_video(&input, "bad.mp4")?;
    common::create_test_file(&input, "bad.srt", b"1\n\xFF\xFE\xFD broken\n")?;
    common::create_test_video(&input, "good.mp4")?;
    common::create_test_subtitle(&input, "good.srt")?;
    let sanitizer = SubtitleSanitizer::new(Box::new(FixedDetector(Some(UTF_8))), &SanitizerConfig::default());
    let harness = common::create_test_controller_with_sanitizer(FakeRunner::new(), sanitizer);
    let settings = Settings {
        remove_ads: true,
        ..Settings::default()
    };

    let response = harness
        .controller
        .process_batch(&BatchRequest::new(&input, &output, settings))
        .await;

    assert_eq!(response.status, BatchStatus::Warning);
    assert_eq!(response.failures.len(), 1);
    assert_eq!(response.failures[0].video, input.join("bad.mp4"));
    assert!(!output.join("bad.mkv").exists());
    assert!(output.join("good.mkv").exists());
    // mkvmerge never ran for the undecodable pair
    assert_eq!(harness.runner.invocations().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_process_batch_withExtractSubtitles_shouldWriteTracksToOutput() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = temp_dir.path().join("I");
    let output = temp_dir.path().join("O");
    let video = common::create_test_video(&input, "movie.mkv")?;
    let identify = r#"{"tracks": [{"id": 2, "type": "subtitles", "properties": {"codec_id": "S_TEXT/UTF8", "language": "ger"}}]}"#;
    let harness = common::create_test_controller(FakeRunner::new().with_identify_output(identify));
    let settings = Settings {
        extract_subtitles: true,
        remove_old: true,
        ..Settings::default()
    };

    let response = harness
        .controller
        .process_batch(&BatchRequest::new(&input, &output, settings))
        .await;

    assert_eq!(response.status, BatchStatus::Complete);
    assert_eq!(fs::read_to_string(output.join("movie.2.ger.srt"))?, "extracted");
    // Extraction never deletes the source
    assert!(video.exists());
    Ok(())
}

#[tokio::test]
async fn test_process_batch_withExtractSameAsSource_shouldWriteNextToVideo() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = temp_dir.path().join("I");
    common::create_test_video(&input, "season/ep.mkv")?;
    let identify = r#"{"tracks": [{"id": 3, "type": "subtitles", "properties": {"codec_id": "S_HDMV/PGS"}}]}"#;
    let harness = common::create_test_controller(FakeRunner::new().with_identify_output(identify));
    let settings = Settings {
        extract_subtitles: true,
        same_as_source: true,
        ..Settings::default()
    };

    let response = harness
        .controller
        .process_batch(&BatchRequest::new(&input, "", settings))
        .await;

    assert_eq!(response.status, BatchStatus::Complete);
    assert!(input.join("season").join("ep.3.und.sup").exists());
    Ok(())
}

#[tokio::test]
async fn test_process_batch_withFailedMerge_shouldNotLeavePartialOutput() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = temp_dir.path().join("I");
    let output = temp_dir.path().join("O");
    common::create_test_video(&input, "movie.mp4")?;
    common::create_test_subtitle(&input, "movie.srt")?;
    let request = BatchRequest::new(&input, &output, Settings::default());

    let failing = common::create_test_controller(FakeRunner::new().with_failing_input("movie.mp4"));
    let response = failing.controller.process_batch(&request).await;

    assert_eq!(response.status, BatchStatus::Warning);
    assert!(common::list_files(&output).is_empty());

    // A retry gets the plain name, not a disambiguated one
    let retry = common::create_test_controller(FakeRunner::new());
    let response = retry.controller.process_batch(&request).await;

    assert_eq!(response.status, BatchStatus::Complete);
    assert_eq!(common::list_files(&output), vec![PathBuf::from("movie.mkv")]);
    assert_eq!(fs::read_to_string(output.join("movie.mkv"))?, MUXED_CONTENT);
    Ok(())
}

#[tokio::test]
async fn test_process_batch_withVobSubPair_shouldPassOnlyIdxToMkvmerge() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = temp_dir.path().join("I");
    let output = temp_dir.path().join("O");
    common::create_test_video(&input, "movie.mp4")?;
    let idx = common::create_test_file(&input, "movie.idx", "# VobSub index file, v7")?;
    let sub = common::create_test_file(&input, "movie.sub", b"\x00\x00\x01\xBA")?;
    let harness = common::create_test_controller(FakeRunner::new());
    let settings = Settings {
        remove_old: true,
        ..Settings::default()
    };

    let response = harness
        .controller
        .process_batch(&BatchRequest::new(&input, &output, settings))
        .await;

    assert_eq!(response.status, BatchStatus::Complete);
    let args = harness.runner.invocations()[0].args_lossy();
    assert!(args.contains(&idx.to_string_lossy().to_string()));
    assert!(!args.contains(&sub.to_string_lossy().to_string()));
    assert_eq!(args.iter().filter(|a| a.as_str() == "--language").count(), 1);
    assert_eq!(args.iter().filter(|a| a.as_str() == "--default-track-flag").count(), 1);
    // The .sub data file still counts as consumed
    assert!(!idx.exists());
    assert!(!sub.exists());
    Ok(())
}
