use tracing::{info, instrument, warn};

use crate::config::Settings;
use crate::dmp::{DmpSegment, DmpService};
use crate::error::SyncError;
use crate::model::SegmentType;

/// Outcome of resolving the segment for one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The segment exists (or was just created) with the expected type.
    Ready { segment: DmpSegment, created: bool },
    /// The segment exists with a different type and cannot take this batch.
    TypeConflict { segment: DmpSegment, message: String },
}

/// Looks the segment up by source id and creates it when absent.
///
/// Lookup and create failures are returned as errors: every event in the
/// batch depends on the segment, so there is nothing partial to report.
#[instrument(skip_all, fields(source_segment_id = %source_segment_id, expected = %expected))]
pub async fn resolve_segment(
    dmp: &dyn DmpService,
    settings: &Settings,
    source_segment_id: &str,
    name: &str,
    expected: SegmentType,
) -> Result<Resolution, SyncError> {
    let existing = dmp
        .fetch_segments(&settings.ad_account_id, source_segment_id)
        .await?;

    let (segment, created) = match existing.into_iter().next() {
        Some(segment) => (segment, false),
        None => {
            info!(name, "no DMP segment for source id; creating");
            let segment = dmp
                .create_segment(&settings.ad_account_id, source_segment_id, name, expected)
                .await?;
            (segment, true)
        }
    };

    if segment.segment_type != expected {
        let message = format!(
            "The existing DMP Segment with Source Segment Id '{}' is of type {} and cannot be used to sync {} audiences.",
            source_segment_id, segment.segment_type, expected
        );
        warn!(segment_id = %segment.id, found = %segment.segment_type, "DMP segment type conflict");
        return Ok(Resolution::TypeConflict { segment, message });
    }

    Ok(Resolution::Ready { segment, created })
}
