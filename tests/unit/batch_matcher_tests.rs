/*!
 * Tests for video/subtitle pairing
 */

use anyhow::Result;
use mkvbatch::batch_matcher::BatchMatcher;
use mkvbatch::errors::BatchError;
use crate::common;

#[test]
fn test_get_files_withMatchingPairs_shouldPairByStem() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let root = temp_dir.path();
    let video = common::create_test_video(root, "movie.mp4")?;
    let sub_en = common::create_test_subtitle(root, "movie.en.srt")?;
    let sub_plain = common::create_test_subtitle(root, "movie.srt")?;
    common::create_test_file(root, "notes.txt", "ignored")?;

    let result = BatchMatcher::new().get_files(root, false)?;

    assert_eq!(result.files.len(), 1);
    assert_eq!(result.files[0].video, video);
    // Name order: "movie.en.srt" < "movie.srt"
    assert_eq!(result.files[0].subtitles, vec![sub_en, sub_plain]);
    assert!(result.warning.is_none());
    Ok(())
}

#[test]
fn test_get_files_withNestedDirectories_shouldReturnDeterministicOrder() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let root = temp_dir.path();
    for name in ["b/ep2.mkv", "b/ep1.mkv", "a/film.avi", "top.mp4"] {
        common::create_test_video(root, name)?;
    }
    for name in ["b/ep2.srt", "b/ep1.srt", "a/film.srt", "top.srt"] {
        common::create_test_subtitle(root, name)?;
    }

    let first = BatchMatcher::new().get_files(root, false)?;
    let second = BatchMatcher::new().get_files(root, false)?;

    let videos: Vec<_> = first
        .files
        .iter()
        .map(|pair| pair.video.strip_prefix(root).unwrap().to_path_buf())
        .collect();
    assert_eq!(videos.len(), 4);
    assert_eq!(videos[0], std::path::PathBuf::from("top.mp4"));
    assert_eq!(videos[1], std::path::PathBuf::from("a/film.avi"));
    assert_eq!(videos[2], std::path::PathBuf::from("b/ep1.mkv"));
    assert_eq!(videos[3], std::path::PathBuf::from("b/ep2.mkv"));
    assert_eq!(first.files, second.files);
    Ok(())
}

#[test]
fn test_get_files_withSubtitleInOtherDirectory_shouldNotPair() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let root = temp_dir.path();
    common::create_test_video(root, "movie.mp4")?;
    common::create_test_subtitle(root, "subs/movie.srt")?;

    let result = BatchMatcher::new().get_files(root, false)?;

    assert!(result.is_empty());
    assert!(result.warning.is_some());
    Ok(())
}

#[test]
fn test_get_files_withVideoOnly_shouldIgnoreSubtitles() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let root = temp_dir.path();
    common::create_test_video(root, "a.mkv")?;
    common::create_test_video(root, "b.mp4")?;
    common::create_test_subtitle(root, "a.srt")?;

    let result = BatchMatcher::new().get_files(root, true)?;

    assert_eq!(result.files.len(), 2);
    assert!(result.files.iter().all(|pair| pair.subtitles.is_empty()));
    assert!(result.warning.is_none());
    Ok(())
}

#[test]
fn test_get_files_withUnmatchedFiles_shouldWarn() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let root = temp_dir.path();
    common::create_test_video(root, "movie.mp4")?;
    common::create_test_subtitle(root, "movie.srt")?;
    common::create_test_video(root, "lonely.mp4")?;
    common::create_test_subtitle(root, "orphan.srt")?;

    let result = BatchMatcher::new().get_files(root, false)?;

    assert_eq!(result.files.len(), 1);
    let warning = result.warning.unwrap();
    assert!(warning.contains("1 video file(s)"));
    assert!(warning.contains("1 subtitle file(s)"));
    Ok(())
}

#[test]
fn test_get_files_withEmptyDirectory_shouldReturnEmptyWithWarning() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;

    let result = BatchMatcher::new().get_files(temp_dir.path(), false)?;

    assert!(result.is_empty());
    assert!(result.warning.is_some());
    Ok(())
}

#[test]
fn test_get_files_withMissingDirectory_shouldFail() {
    let result = BatchMatcher::new().get_files("/definitely/not/here", false);
    assert!(matches!(result, Err(BatchError::InputDirectory { .. })));
}

#[test]
fn test_get_files_withOverlappingStems_shouldGiveEachSubtitleToOneVideo() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let root = temp_dir.path();
    let extended = common::create_test_video(root, "Show.Extended.mp4")?;
    let show = common::create_test_video(root, "Show.mp4")?;
    let extended_sub = common::create_test_subtitle(root, "Show.Extended.en.srt")?;
    let show_sub = common::create_test_subtitle(root, "Show.en.srt")?;

    let result = BatchMatcher::new().get_files(root, false)?;

    assert_eq!(result.files.len(), 2);
    assert_eq!(result.files[0].video, extended);
    assert_eq!(result.files[0].subtitles, vec![extended_sub]);
    assert_eq!(result.files[1].video, show);
    assert_eq!(result.files[1].subtitles, vec![show_sub]);
    assert!(result.warning.is_none());
    Ok(())
}
