//! C ABI for chessboard detection and camera calibration.
//!
//! Every entry point borrows caller memory for the duration of the call only
//! and returns a heap-allocated, NUL-terminated JSON string with the same
//! shape the `checkercal` CLI prints. Release it with
//! [`checkercal_string_free`].
//!
//! Null or inconsistent arguments produce an `InvalidInput` failure payload.
//! Panics never cross the boundary.

use std::ffi::{c_char, CString};
use std::panic::{catch_unwind, AssertUnwindSafe};

use checkercal::candidates::size_hint;
use checkercal::core::{BoardPoint, CalibError, GrayImage, ImagePointSet, ImageSize};
use checkercal::pipeline::Pipeline;
use checkercal::report::{outcome_json, to_json, CalibrationReport, DetectionReport, FailureReport};
use checkercal::{ObjectPointEntry, ObjectPointsInput};
use nalgebra::Point2;

/// Object-point layout selector for [`checkercal_calibrate`].
pub const CHECKERCAL_LAYOUT_AUTO: i32 = 0;
pub const CHECKERCAL_LAYOUT_SHARED: i32 = 1;
pub const CHECKERCAL_LAYOUT_PER_VIEW: i32 = 2;

fn invalid(message: impl Into<String>) -> CalibError {
    CalibError::InvalidInput(message.into())
}

fn into_c_string(json: String) -> *mut c_char {
    match CString::new(json) {
        Ok(s) => s.into_raw(),
        Err(_) => CString::new(
            r#"{"success":false,"error_kind":"InvalidInput","error":"payload contained NUL"}"#,
        )
        .map(CString::into_raw)
        .unwrap_or(std::ptr::null_mut()),
    }
}

/// Run `body` and turn a panic into a failure payload.
fn guarded(body: impl FnOnce() -> String) -> *mut c_char {
    let json = catch_unwind(AssertUnwindSafe(body)).unwrap_or_else(|panic| {
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        log::error!("panic at the C boundary: {message}");
        to_json(
            &FailureReport::from(&invalid(format!("internal panic: {message}"))),
            false,
        )
    });
    into_c_string(json)
}

/// Borrow `len` elements, rejecting null pointers for non-empty slices.
///
/// # Safety
/// When `len > 0`, `ptr` must be valid for reads of `len` elements.
unsafe fn borrow<'a, T>(ptr: *const T, len: usize, what: &str) -> Result<&'a [T], CalibError> {
    if len == 0 {
        return Ok(&[]);
    }
    if ptr.is_null() {
        return Err(invalid(format!("{what} is null")));
    }
    // SAFETY: non-null and valid for `len` reads per the caller contract.
    Ok(unsafe { std::slice::from_raw_parts(ptr, len) })
}

fn to_usize(value: u32) -> usize {
    value as usize
}

/// # Safety
/// See [`checkercal_detect_corners`].
unsafe fn detect_impl(
    pixels: *const u8,
    width: u32,
    height: u32,
    channels: u32,
    stride: u32,
    rows: i32,
    cols: i32,
) -> Result<checkercal::PatternDetection, CalibError> {
    let (width, height, channels) = (to_usize(width), to_usize(height), to_usize(channels));
    if width == 0 || height == 0 {
        return Err(invalid(format!("empty image ({width}x{height})")));
    }
    let row_bytes = width
        .checked_mul(channels)
        .ok_or_else(|| invalid("image dimensions overflow"))?;
    let stride = if stride == 0 {
        row_bytes
    } else {
        to_usize(stride)
    };
    let len = stride
        .checked_mul(height - 1)
        .and_then(|n| n.checked_add(row_bytes))
        .ok_or_else(|| invalid("image dimensions overflow"))?;
    // SAFETY: forwarded caller contract.
    let data = unsafe { borrow(pixels, len, "pixels") }?;
    let gray = GrayImage::from_interleaved(width, height, channels, stride, data)?;

    let pipeline = Pipeline::default();
    pipeline.detect(
        &gray.view(),
        size_hint(i64::from(rows), i64::from(cols)),
    )
}

/// Locate a chessboard and return its refined inner corners as JSON.
///
/// `channels` is 1 (gray), 3 (RGB) or 4 (RGBA); `stride` is the byte
/// distance between row starts, or 0 for tightly packed rows. Pass
/// `rows`/`cols` of 0 to search sizes automatically.
///
/// # Safety
/// `pixels` must point to at least `stride * (height - 1) + width * channels`
/// readable bytes for the duration of the call.
#[no_mangle]
pub unsafe extern "C" fn checkercal_detect_corners(
    pixels: *const u8,
    width: u32,
    height: u32,
    channels: u32,
    stride: u32,
    rows: i32,
    cols: i32,
) -> *mut c_char {
    guarded(|| {
        // SAFETY: forwarded caller contract.
        let outcome = unsafe { detect_impl(pixels, width, height, channels, stride, rows, cols) };
        outcome_json::<_, DetectionReport>(&outcome, false)
    })
}

/// Split a flat coordinate buffer into per-set chunks of `dims` values per
/// point.
fn split_sets<'a>(
    flat: &'a [f64],
    counts: &[u32],
    dims: usize,
) -> impl Iterator<Item = &'a [f64]> + 'a {
    let mut offset = 0;
    let bounds: Vec<(usize, usize)> = counts
        .iter()
        .map(|&n| {
            let start = offset;
            offset += to_usize(n) * dims;
            (start, offset)
        })
        .collect();
    bounds.into_iter().map(move |(a, b)| &flat[a..b])
}

/// Number of `f64` values spanned by `counts` points of `dims` coordinates.
fn coordinate_count(counts: &[u32], dims: usize) -> Result<usize, CalibError> {
    counts
        .iter()
        .try_fold(0usize, |acc, &n| acc.checked_add(to_usize(n)))
        .and_then(|points| points.checked_mul(dims))
        .ok_or_else(|| invalid("point counts overflow"))
}

fn board_points(chunk: &[f64], dims: usize) -> Vec<BoardPoint> {
    chunk
        .chunks_exact(dims)
        .map(|c| {
            if dims == 3 {
                BoardPoint::new(c[0], c[1], c[2])
            } else {
                BoardPoint::planar(c[0], c[1])
            }
        })
        .collect()
}

/// # Safety
/// See [`checkercal_calibrate`].
#[allow(clippy::too_many_arguments)]
unsafe fn calibrate_impl(
    image_xy: *const f64,
    image_counts: *const u32,
    n_views: u32,
    object_pts: *const f64,
    object_dims: u32,
    object_counts: *const u32,
    n_object_sets: u32,
    layout: i32,
    width: u32,
    height: u32,
) -> Result<checkercal::CalibrationResult, CalibError> {
    let dims = to_usize(object_dims);
    if dims != 2 && dims != 3 {
        return Err(invalid(format!("object_dims must be 2 or 3, got {dims}")));
    }
    // SAFETY: forwarded caller contract.
    let image_counts = unsafe { borrow(image_counts, to_usize(n_views), "image_counts") }?;
    let object_counts =
        unsafe { borrow(object_counts, to_usize(n_object_sets), "object_counts") }?;
    let image_len = coordinate_count(image_counts, 2)?;
    let object_len = coordinate_count(object_counts, dims)?;
    let image_xy = unsafe { borrow(image_xy, image_len, "image_xy") }?;
    let object_pts = unsafe { borrow(object_pts, object_len, "object_pts") }?;

    let image_points: Vec<ImagePointSet> = split_sets(image_xy, image_counts, 2)
        .map(|chunk| {
            chunk
                .chunks_exact(2)
                .map(|c| Point2::new(c[0], c[1]))
                .collect()
        })
        .collect();
    let mut object_sets: Vec<Vec<BoardPoint>> = split_sets(object_pts, object_counts, dims)
        .map(|chunk| board_points(chunk, dims))
        .collect();

    let object_points = match layout {
        CHECKERCAL_LAYOUT_SHARED => {
            if object_sets.len() != 1 {
                return Err(invalid(format!(
                    "shared layout expects one object point set, got {}",
                    object_sets.len()
                )));
            }
            ObjectPointsInput::Shared(object_sets.remove(0))
        }
        CHECKERCAL_LAYOUT_PER_VIEW => ObjectPointsInput::PerView(object_sets),
        CHECKERCAL_LAYOUT_AUTO => {
            let entries = if object_sets.len() == image_points.len() {
                object_sets.into_iter().map(ObjectPointEntry::View).collect()
            } else if object_sets.len() == 1 {
                object_sets
                    .remove(0)
                    .into_iter()
                    .map(ObjectPointEntry::Point)
                    .collect()
            } else {
                return Err(invalid(format!(
                    "{} object point sets for {} views",
                    object_sets.len(),
                    image_points.len()
                )));
            };
            ObjectPointsInput::Legacy(entries)
        }
        other => return Err(invalid(format!("unknown object layout {other}"))),
    };

    Pipeline::default().calibrate(image_points, object_points, ImageSize::new(width, height))
}

/// Calibrate a camera from detected corners and return the result as JSON.
///
/// `image_xy` holds `x, y` pairs for all views back to back, `image_counts[i]`
/// points for view `i`. `object_pts` holds `n_object_sets` sets of
/// `object_dims` (2 or 3) coordinates per point, sizes in `object_counts`.
/// `layout` is one of the `CHECKERCAL_LAYOUT_*` constants; with
/// [`CHECKERCAL_LAYOUT_AUTO`] a set count equal to `n_views` means one set per
/// view and a single set is shared by all views.
///
/// # Safety
/// Every pointer must be valid for reads of the element count implied by the
/// count arguments for the duration of the call.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn checkercal_calibrate(
    image_xy: *const f64,
    image_counts: *const u32,
    n_views: u32,
    object_pts: *const f64,
    object_dims: u32,
    object_counts: *const u32,
    n_object_sets: u32,
    layout: i32,
    width: u32,
    height: u32,
) -> *mut c_char {
    guarded(|| {
        // SAFETY: forwarded caller contract.
        let outcome = unsafe {
            calibrate_impl(
                image_xy,
                image_counts,
                n_views,
                object_pts,
                object_dims,
                object_counts,
                n_object_sets,
                layout,
                width,
                height,
            )
        };
        outcome_json::<_, CalibrationReport>(&outcome, false)
    })
}

/// Release a string returned by this library. Null is ignored.
///
/// # Safety
/// `ptr` must come from a `checkercal_*` call and must not be used afterwards.
#[no_mangle]
pub unsafe extern "C" fn checkercal_string_free(ptr: *mut c_char) {
    if !ptr.is_null() {
        // SAFETY: allocated by `CString::into_raw` in this crate.
        drop(unsafe { CString::from_raw(ptr) });
    }
}

/// Library version as a static NUL-terminated string.
#[no_mangle]
pub extern "C" fn checkercal_version() -> *const c_char {
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr().cast()
}
