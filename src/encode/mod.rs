pub mod ffmpeg;
pub mod jsonl;
