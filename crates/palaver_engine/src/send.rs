use palaver_protocol::MessageKind;

use crate::EngineError;

/// Upload size cap.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Upload formats rendered inline as images; everything else is a plain
/// file attachment.
pub const IMAGE_FORMATS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

/// A file picked for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePayload {
	pub name: String,
	pub bytes: Vec<u8>,
}

impl FilePayload {
	pub fn len(&self) -> usize {
		self.bytes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.bytes.is_empty()
	}
}

/// Validated send intent: trimmed content plus the file to upload first,
/// if any. `None` means the send is a no-op (nothing to say, nothing to
/// attach) — no upload call, no emitted event.
#[derive(Debug)]
pub struct SendPlan {
	pub content: String,
	pub file: Option<FilePayload>,
}

/// Validate user send intent before any network traffic. Oversize files
/// fail here with `PayloadTooLarge`; the backend is never contacted.
pub fn plan_send(text: &str, file: Option<FilePayload>, max_upload_bytes: usize) -> Result<Option<SendPlan>, EngineError> {
	let content = text.trim();

	if let Some(file) = &file
		&& file.len() > max_upload_bytes
	{
		return Err(EngineError::PayloadTooLarge {
			len: file.len(),
			max: max_upload_bytes,
		});
	}

	if content.is_empty() && file.is_none() {
		return Ok(None);
	}

	Ok(Some(SendPlan {
		content: content.to_string(),
		file,
	}))
}

/// Classify a message by its uploaded artifact's format. Upload formats
/// are matched case-insensitively against the fixed image set.
pub fn classify(upload_format: Option<&str>) -> MessageKind {
	match upload_format {
		None => MessageKind::Text,
		Some(format) => {
			let format = format.trim_start_matches('.').to_ascii_lowercase();
			if IMAGE_FORMATS.contains(&format.as_str()) {
				MessageKind::Image
			} else {
				MessageKind::File
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn file(len: usize) -> FilePayload {
		FilePayload {
			name: "pic.png".to_string(),
			bytes: vec![0u8; len],
		}
	}

	#[test]
	fn empty_send_is_a_noop() {
		assert!(plan_send("", None, MAX_UPLOAD_BYTES).unwrap().is_none());
		assert!(plan_send("   \t  ", None, MAX_UPLOAD_BYTES).unwrap().is_none());
	}

	#[test]
	fn text_is_trimmed() {
		let plan = plan_send("  hi  ", None, MAX_UPLOAD_BYTES).unwrap().unwrap();
		assert_eq!(plan.content, "hi");
		assert!(plan.file.is_none());
	}

	#[test]
	fn file_alone_is_enough() {
		let plan = plan_send("", Some(file(16)), MAX_UPLOAD_BYTES).unwrap().unwrap();
		assert!(plan.content.is_empty());
		assert!(plan.file.is_some());
	}

	#[test]
	fn oversize_file_fails_before_any_network_call() {
		let err = plan_send("look", Some(file(MAX_UPLOAD_BYTES + 1)), MAX_UPLOAD_BYTES).unwrap_err();
		match err {
			EngineError::PayloadTooLarge { len, max } => {
				assert_eq!(len, MAX_UPLOAD_BYTES + 1);
				assert_eq!(max, MAX_UPLOAD_BYTES);
			}
			other => panic!("unexpected error: {other:?}"),
		}

		// Exactly at the cap is fine.
		assert!(plan_send("", Some(file(MAX_UPLOAD_BYTES)), MAX_UPLOAD_BYTES).unwrap().is_some());
	}

	#[test]
	fn classification_follows_the_image_set() {
		assert_eq!(classify(None), MessageKind::Text);
		assert_eq!(classify(Some("png")), MessageKind::Image);
		assert_eq!(classify(Some("JPEG")), MessageKind::Image);
		assert_eq!(classify(Some(".gif")), MessageKind::Image);
		assert_eq!(classify(Some("pdf")), MessageKind::File);
		assert_eq!(classify(Some("")), MessageKind::File);
	}
}
