//! Inline images as `data:` URLs so the rendered HTML is self-contained.

use std::io::Read as _;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use log::debug;
use quire_resolver::{Locator, ResolveContext, Resolver};

use crate::{
  ast::{Document, NodeKind},
  error::{TransformError, TransformResult},
};

/// Replace every image destination in `document` with a `data:` URL.
///
/// Destinations are resolved through `resolver`, so relative paths are
/// looked up against the context's working directory.
///
/// # Errors
///
/// Returns the first resolution failure.
pub fn embed_images(
  document: &mut Document,
  resolver: &dyn Resolver,
  ctx: &ResolveContext,
) -> TransformResult<()> {
  let mut result = Ok(());
  document.walk_mut(&mut |node| {
    if result.is_err() {
      return;
    }
    if let NodeKind::Image { url, .. } = &mut node.kind {
      if url.starts_with("data:") || url.is_empty() {
        return;
      }
      match data_url(&Locator::from(url.as_str()), None, resolver, ctx) {
        Ok(embedded) => *url = embedded,
        Err(err) => result = Err(err),
      }
    }
  });
  result
}

/// Fetch `locator` and encode it as a `data:` URL.
///
/// When `mime` is `None` the type is guessed from the locator and then from
/// the content.
///
/// # Errors
///
/// Returns an error if the resource cannot be fetched.
pub fn data_url(
  locator: &Locator,
  mime: Option<&str>,
  resolver: &dyn Resolver,
  ctx: &ResolveContext,
) -> TransformResult<String> {
  let bytes = resolver
    .resolve(locator, ctx)
    .and_then(|mut reader| {
      let mut buf = Vec::new();
      reader
        .read_to_end(&mut buf)
        .map_err(|e| quire_resolver::ResolveError::failed(locator, e))?;
      Ok(buf)
    })
    .map_err(|source| {
      TransformError::Resolve {
        locator: locator.clone(),
        source,
      }
    })?;

  let mime = mime.map_or_else(|| guess_mime(locator, &bytes), str::to_owned);
  debug!("Embedding '{locator}' as {mime} ({} bytes)", bytes.len());
  Ok(format!("data:{mime};base64,{}", STANDARD.encode(&bytes)))
}

/// Mime type from the locator's extension, falling back to the content.
#[must_use]
pub fn guess_mime(locator: &Locator, bytes: &[u8]) -> String {
  let path = if locator.is_url() {
    locator.url_path().to_owned()
  } else {
    locator.as_str().to_owned()
  };

  if path.to_ascii_lowercase().ends_with(".svg") {
    return "image/svg+xml".to_owned();
  }
  if let Some(mime) = mime_guess::from_path(&path).first() {
    return mime.essence_str().to_owned();
  }
  sniff(bytes)
    .unwrap_or("application/octet-stream")
    .to_owned()
}

fn sniff(bytes: &[u8]) -> Option<&'static str> {
  const SIGNATURES: &[(&[u8], &str)] = &[
    (b"\x89PNG\r\n\x1a\n", "image/png"),
    (b"\xff\xd8\xff", "image/jpeg"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"%PDF-", "application/pdf"),
    (b"BM", "image/bmp"),
  ];

  if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
    return Some("image/webp");
  }
  if let Some((_, mime)) = SIGNATURES
    .iter()
    .find(|(magic, _)| bytes.starts_with(magic))
  {
    return Some(mime);
  }

  let head = String::from_utf8_lossy(&bytes[..bytes.len().min(512)]);
  let head = head.trim_start();
  if head.starts_with("<svg") || (head.starts_with("<?xml") && head.contains("<svg")) {
    return Some("image/svg+xml");
  }
  None
}
