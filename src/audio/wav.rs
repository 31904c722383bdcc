//! WAV encoding helpers.
//!
//! Mono 16-bit PCM only; everything this crate handles is already in that
//! shape by the time it is persisted or uploaded.

use crate::error::{Result, StreamscribeError};
use std::io::Cursor;
use std::path::Path;

fn spec(sample_rate: u32) -> hound::WavSpec {
    hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

/// Writes samples to a WAV file on disk.
pub fn write_wav_file(path: &Path, sample_rate: u32, samples: &[i16]) -> Result<()> {
    let mut writer = hound::WavWriter::create(path, spec(sample_rate)).map_err(|e| {
        StreamscribeError::Recording {
            message: format!("failed to create {}: {}", path.display(), e),
        }
    })?;
    for &sample in samples {
        writer
            .write_sample(sample)
            .map_err(|e| StreamscribeError::Recording {
                message: format!("failed to write {}: {}", path.display(), e),
            })?;
    }
    writer.finalize().map_err(|e| StreamscribeError::Recording {
        message: format!("failed to finalize {}: {}", path.display(), e),
    })?;
    Ok(())
}

/// Encodes samples as an in-memory WAV, e.g. for HTTP upload bodies.
pub fn encode_wav(sample_rate: u32, samples: &[i16]) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec(sample_rate)).map_err(|e| {
                StreamscribeError::Recording {
                    message: format!("failed to encode wav: {}", e),
                }
            })?;
        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| StreamscribeError::Recording {
                    message: format!("failed to encode wav: {}", e),
                })?;
        }
        writer.finalize().map_err(|e| StreamscribeError::Recording {
            message: format!("failed to encode wav: {}", e),
        })?;
    }
    Ok(cursor.into_inner())
}
