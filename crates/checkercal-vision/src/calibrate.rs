//! Planar-target camera calibration.
//!
//! 1. One normalized-DLT homography per view (board plane → image).
//! 2. Focal lengths from the homography orthogonality constraints with the
//!    principal point fixed at the image centre.
//! 3. Per-view pose from homography decomposition.
//! 4. Levenberg–Marquardt over intrinsics, distortion and all poses.

use crate::camera::{project_camera_point, rotation_from_rvec};
use crate::homography::{estimate_homography, Homography};
use checkercal_core::{
    BackendError, CalibrationSolver, ImagePointSet, ImageSize, ObjectPointSet, SolverOutput,
};
use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use lm_nalgebra::storage::Owned;
use lm_nalgebra::Dyn;
use log::{debug, info, warn};
use nalgebra::{DMatrix, DVector, Matrix3, Point2, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Number of intrinsic parameters `fx fy cx cy` at the front of the vector.
const N_INTRINSICS: usize = 4;
const N_POSE: usize = 6;
const MIN_POINTS_PER_VIEW: usize = 4;
/// Residual assigned to a point that lands behind the camera, so trial
/// steps crossing the image plane are rejected by the cost test.
const BEHIND_CAMERA_RESIDUAL: f64 = 1e6;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistortionModel {
    /// `k1 k2 p1 p2 k3`.
    #[default]
    RadialTangential,
    /// `k1 k2 p1 p2 k3 k4 k5 k6`.
    Rational,
}

impl DistortionModel {
    pub fn coefficient_count(self) -> usize {
        match self {
            DistortionModel::RadialTangential => 5,
            DistortionModel::Rational => 8,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverParams {
    pub distortion_model: DistortionModel,
    /// Keep `cx, cy` at the image centre.
    pub fix_principal_point: bool,
    /// Keep `fx == fy`.
    pub fix_aspect_ratio: bool,
    /// Keep `p1 = p2 = 0`.
    pub zero_tangent_dist: bool,
    /// Keep `k3 = 0`.
    pub fix_k3: bool,
    pub max_iterations: usize,
    /// Relative cost decrease that ends the optimization.
    pub epsilon: f64,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            distortion_model: DistortionModel::RadialTangential,
            fix_principal_point: false,
            fix_aspect_ratio: false,
            zero_tangent_dist: false,
            fix_k3: false,
            max_iterations: 30,
            epsilon: f64::EPSILON,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct PlanarCalibrator {
    pub params: SolverParams,
}

impl PlanarCalibrator {
    pub fn new(params: SolverParams) -> Self {
        Self { params }
    }
}

impl CalibrationSolver for PlanarCalibrator {
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip_all, fields(views = image_points.len())))]
    fn calibrate(
        &self,
        object_points: &[ObjectPointSet],
        image_points: &[ImagePointSet],
        image_size: ImageSize,
    ) -> Result<SolverOutput, BackendError> {
        validate(object_points, image_points, image_size)?;

        let homographies = object_points
            .iter()
            .zip(image_points)
            .enumerate()
            .map(|(i, (obj, img))| {
                let src: Vec<Point2<f64>> = obj.iter().map(|p| Point2::new(p.x, p.y)).collect();
                estimate_homography(&src, img).ok_or_else(|| {
                    BackendError::new(format!("view {i}: board points are degenerate"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let cx = (image_size.width as f64 - 1.0) * 0.5;
        let cy = (image_size.height as f64 - 1.0) * 0.5;
        let (fx, fy) = init_focal_lengths(&homographies, cx, cy, self.params.fix_aspect_ratio)?;
        let k0 = Matrix3::new(fx, 0.0, cx, 0.0, fy, cy, 0.0, 0.0, 1.0);
        debug!("initial intrinsics fx={fx:.2} fy={fy:.2} cx={cx:.2} cy={cy:.2}");

        let poses = homographies
            .iter()
            .enumerate()
            .map(|(i, h)| {
                pose_from_homography(&k0, h)
                    .ok_or_else(|| BackendError::new(format!("view {i}: cannot recover pose")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let layout = ParamLayout::new(&self.params, object_points.len(), fx, fy);
        let mut base = DVector::<f64>::zeros(layout.len());
        base[0] = fx;
        base[1] = fy;
        base[2] = cx;
        base[3] = cy;
        for (v, (rvec, tvec)) in poses.iter().enumerate() {
            let o = layout.view_offset(v);
            base.fixed_rows_mut::<3>(o).copy_from(rvec);
            base.fixed_rows_mut::<3>(o + 3).copy_from(tvec);
        }

        let x0 = layout.gather(&base);
        let problem = PlanarProblem {
            objects: object_points,
            images: image_points,
            offsets: row_offsets(image_points),
            layout,
            base,
            x: x0,
        };
        if problem.n_rows() < problem.x.len() {
            return Err(BackendError::new(format!(
                "{} residuals cannot constrain {} free parameters",
                problem.n_rows(),
                problem.x.len()
            )));
        }
        if !problem.residual_vector().1 {
            return Err(BackendError::new(
                "initial estimate projects points behind the camera",
            ));
        }

        let tol = self.params.epsilon.max(0.0);
        let lm = LevenbergMarquardt::new()
            .with_ftol(tol)
            .with_xtol(tol)
            .with_patience(self.params.max_iterations.max(1));
        let (problem, report) = lm.minimize(problem);
        if !report.termination.was_successful() {
            warn!("optimizer stopped early: {:?}", report.termination);
        }

        let full = problem.layout.scatter(&problem.base, &problem.x);
        let (residuals, valid) = problem.residual_vector();
        if !valid || full.iter().chain(residuals.iter()).any(|v| !v.is_finite()) {
            return Err(BackendError::new("optimization diverged"));
        }

        let total_points: usize = image_points.iter().map(Vec::len).sum();
        let rms = (residuals.norm_squared() / total_points as f64).sqrt();
        info!(
            "calibrated {} views in {} evaluations, rms {:.4} px",
            object_points.len(),
            report.number_of_evaluations,
            rms
        );

        let nd = problem.layout.n_dist;
        Ok(SolverOutput {
            camera_matrix: camera_matrix(&full),
            dist_coeffs: full.rows(N_INTRINSICS, nd).iter().copied().collect(),
            rvecs: (0..object_points.len())
                .map(|v| full.fixed_rows::<3>(problem.layout.view_offset(v)).into_owned())
                .collect(),
            tvecs: (0..object_points.len())
                .map(|v| full.fixed_rows::<3>(problem.layout.view_offset(v) + 3).into_owned())
                .collect(),
            rms,
        })
    }
}

fn validate(
    object_points: &[ObjectPointSet],
    image_points: &[ImagePointSet],
    image_size: ImageSize,
) -> Result<(), BackendError> {
    if object_points.is_empty() {
        return Err(BackendError::new("no views to calibrate"));
    }
    if object_points.len() != image_points.len() {
        return Err(BackendError::new(format!(
            "{} object point sets vs {} image point sets",
            object_points.len(),
            image_points.len()
        )));
    }
    if image_size.width == 0 || image_size.height == 0 {
        return Err(BackendError::new(format!(
            "image size must be positive, got {}x{}",
            image_size.width, image_size.height
        )));
    }
    for (i, (obj, img)) in object_points.iter().zip(image_points).enumerate() {
        if obj.len() != img.len() {
            return Err(BackendError::new(format!(
                "view {i}: {} object points vs {} image points",
                obj.len(),
                img.len()
            )));
        }
        if obj.len() < MIN_POINTS_PER_VIEW {
            return Err(BackendError::new(format!(
                "view {i}: need at least {MIN_POINTS_PER_VIEW} points, got {}",
                obj.len()
            )));
        }
        let finite = obj.iter().all(|p| p.coords.iter().all(|c| c.is_finite()))
            && img.iter().all(|p| p.coords.iter().all(|c| c.is_finite()));
        if !finite {
            return Err(BackendError::new(format!("view {i}: non-finite coordinates")));
        }
        let scale = obj
            .iter()
            .map(|p| p.x.abs().max(p.y.abs()))
            .fold(1.0f64, f64::max);
        if obj.iter().any(|p| p.z.abs() > 1e-9 * scale) {
            return Err(BackendError::new(format!(
                "view {i}: board points must be planar with z = 0"
            )));
        }
    }
    Ok(())
}

/// Solve `1/fx²`, `1/fy²` from `h1ᵀωh2 = 0` and `h1ᵀωh1 = h2ᵀωh2` across
/// all views, after moving the principal point to the origin.
fn init_focal_lengths(
    homographies: &[Homography],
    cx: f64,
    cy: f64,
    same_focal: bool,
) -> Result<(f64, f64), BackendError> {
    let n = homographies.len();
    let cols = if same_focal { 1 } else { 2 };
    let mut a = DMatrix::<f64>::zeros(2 * n, cols);
    let mut b = DVector::<f64>::zeros(2 * n);

    for (k, hom) in homographies.iter().enumerate() {
        let h = hom.h;
        let centered = |col: usize| {
            Vector3::new(
                h[(0, col)] - cx * h[(2, col)],
                h[(1, col)] - cy * h[(2, col)],
                h[(2, col)],
            )
        };
        let (mut h1, mut h2) = (centered(0), centered(1));
        let scale = h1.amax().max(h2.amax());
        if scale <= 0.0 || !scale.is_finite() {
            return Err(BackendError::new(format!("view {k}: degenerate homography")));
        }
        h1 /= scale;
        h2 /= scale;

        let ortho = [h1.x * h2.x, h1.y * h2.y];
        let norms = [h1.x * h1.x - h2.x * h2.x, h1.y * h1.y - h2.y * h2.y];
        if same_focal {
            a[(2 * k, 0)] = ortho[0] + ortho[1];
            a[(2 * k + 1, 0)] = norms[0] + norms[1];
        } else {
            a[(2 * k, 0)] = ortho[0];
            a[(2 * k, 1)] = ortho[1];
            a[(2 * k + 1, 0)] = norms[0];
            a[(2 * k + 1, 1)] = norms[1];
        }
        b[2 * k] = -h1.z * h2.z;
        b[2 * k + 1] = -(h1.z * h1.z - h2.z * h2.z);
    }

    let svd = a.svd(true, true);
    let x = svd
        .solve(&b, 1e-12)
        .map_err(|e| BackendError::new(format!("focal length system: {e}")))?;
    let inv_sq = if same_focal { [x[0], x[0]] } else { [x[0], x[1]] };
    if inv_sq.iter().any(|v| !v.is_finite() || *v <= 0.0) {
        return Err(BackendError::new(
            "cannot initialize focal length; views may be too close to fronto-parallel",
        ));
    }
    Ok((1.0 / inv_sq[0].sqrt(), 1.0 / inv_sq[1].sqrt()))
}

/// Decompose `H ~ K [r1 r2 t]` into a Rodrigues vector and translation with
/// the board in front of the camera.
fn pose_from_homography(k: &Matrix3<f64>, h: &Homography) -> Option<(Vector3<f64>, Vector3<f64>)> {
    let k_inv = k.try_inverse()?;
    let m = k_inv * h.h;
    let m1 = m.column(0).into_owned();
    let m2 = m.column(1).into_owned();
    let m3 = m.column(2).into_owned();
    let denom = m1.norm() + m2.norm();
    if denom <= f64::EPSILON {
        return None;
    }
    let mut lambda = 2.0 / denom;
    if m3.z * lambda < 0.0 {
        lambda = -lambda;
    }
    let r1 = m1 * lambda;
    let r2 = m2 * lambda;
    let t = m3 * lambda;
    let r3 = r1.cross(&r2);
    let approx = Matrix3::from_columns(&[r1, r2, r3]);
    let rot = Rotation3::from_matrix(&approx);
    let rvec = rot.scaled_axis();
    if rvec.iter().chain(t.iter()).any(|v| !v.is_finite()) {
        return None;
    }
    Some((rvec, t))
}

fn camera_matrix(full: &DVector<f64>) -> Matrix3<f64> {
    Matrix3::new(full[0], 0.0, full[2], 0.0, full[1], full[3], 0.0, 0.0, 1.0)
}

/// Which entries of the full parameter vector the optimizer may move.
///
/// Full layout: `fx fy cx cy | dist… | (rvec tvec) per view`.
struct ParamLayout {
    n_dist: usize,
    n_views: usize,
    free: Vec<usize>,
    /// `fy / fx` when the aspect ratio is held fixed.
    aspect: Option<f64>,
}

impl ParamLayout {
    fn new(params: &SolverParams, n_views: usize, fx: f64, fy: f64) -> Self {
        let n_dist = params.distortion_model.coefficient_count();
        let mut free = vec![0];
        if !params.fix_aspect_ratio {
            free.push(1);
        }
        if !params.fix_principal_point {
            free.extend([2, 3]);
        }
        for d in 0..n_dist {
            let tangential = d == 2 || d == 3;
            if (tangential && params.zero_tangent_dist) || (d == 4 && params.fix_k3) {
                continue;
            }
            free.push(N_INTRINSICS + d);
        }
        let first_pose = N_INTRINSICS + n_dist;
        free.extend(first_pose..first_pose + N_POSE * n_views);
        Self {
            n_dist,
            n_views,
            free,
            aspect: params.fix_aspect_ratio.then(|| fy / fx),
        }
    }

    fn len(&self) -> usize {
        N_INTRINSICS + self.n_dist + N_POSE * self.n_views
    }

    fn view_offset(&self, view: usize) -> usize {
        N_INTRINSICS + self.n_dist + N_POSE * view
    }

    /// Index of the first pose parameter; everything before is shared.
    fn first_pose(&self) -> usize {
        self.view_offset(0)
    }

    fn gather(&self, full: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(self.free.len(), self.free.iter().map(|&i| full[i]))
    }

    fn scatter(&self, base: &DVector<f64>, x: &DVector<f64>) -> DVector<f64> {
        let mut full = base.clone();
        for (k, &i) in self.free.iter().enumerate() {
            full[i] = x[k];
        }
        if let Some(ratio) = self.aspect {
            full[1] = full[0] * ratio;
        }
        full
    }
}

fn row_offsets(images: &[ImagePointSet]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(images.len() + 1);
    let mut acc = 0;
    offsets.push(0);
    for img in images {
        acc += 2 * img.len();
        offsets.push(acc);
    }
    offsets
}

struct PlanarProblem<'a> {
    objects: &'a [ObjectPointSet],
    images: &'a [ImagePointSet],
    /// Start of each view's rows in the residual vector, plus the total.
    offsets: Vec<usize>,
    layout: ParamLayout,
    /// Full parameter vector holding the values of fixed entries.
    base: DVector<f64>,
    /// Current free parameters.
    x: DVector<f64>,
}

impl PlanarProblem<'_> {
    fn n_rows(&self) -> usize {
        self.offsets[self.offsets.len() - 1]
    }

    /// Write view `v`'s residuals (`projected - observed`, x then y) into
    /// `out`. Returns `false` when a point fell behind the camera.
    fn view_residuals(&self, full: &DVector<f64>, v: usize, out: &mut [f64]) -> bool {
        let k = camera_matrix(full);
        let dist = &full.as_slice()[N_INTRINSICS..N_INTRINSICS + self.layout.n_dist];
        let o = self.layout.view_offset(v);
        let rot = rotation_from_rvec(&full.fixed_rows::<3>(o).into_owned());
        let t = full.fixed_rows::<3>(o + 3).into_owned();
        let mut valid = true;
        for (i, (p, q)) in self.objects[v].iter().zip(&self.images[v]).enumerate() {
            let pc = rot * p.coords + t;
            match project_camera_point(&pc, &k, dist) {
                Some(proj) => {
                    out[2 * i] = proj.x - q.x;
                    out[2 * i + 1] = proj.y - q.y;
                }
                None => {
                    out[2 * i] = BEHIND_CAMERA_RESIDUAL;
                    out[2 * i + 1] = BEHIND_CAMERA_RESIDUAL;
                    valid = false;
                }
            }
        }
        valid
    }

    fn all_residuals(&self, full: &DVector<f64>) -> (DVector<f64>, bool) {
        let mut r = DVector::<f64>::zeros(self.n_rows());
        let mut valid = true;
        for v in 0..self.images.len() {
            let rows = &mut r.as_mut_slice()[self.offsets[v]..self.offsets[v + 1]];
            valid &= self.view_residuals(full, v, rows);
        }
        (r, valid)
    }

    fn residual_vector(&self) -> (DVector<f64>, bool) {
        self.all_residuals(&self.layout.scatter(&self.base, &self.x))
    }

    /// Central differences, exploiting that pose parameters only touch
    /// their own view's rows.
    fn numeric_jacobian(&self) -> DMatrix<f64> {
        let mut jac = DMatrix::<f64>::zeros(self.n_rows(), self.x.len());
        let mut xp = self.x.clone();

        for (col, &param) in self.layout.free.iter().enumerate() {
            let step = 1e-6 * self.x[col].abs().max(1.0);
            let orig = xp[col];

            if param < self.layout.first_pose() {
                xp[col] = orig + step;
                let (rp, _) = self.all_residuals(&self.layout.scatter(&self.base, &xp));
                xp[col] = orig - step;
                let (rm, _) = self.all_residuals(&self.layout.scatter(&self.base, &xp));
                xp[col] = orig;
                jac.set_column(col, &((rp - rm) / (2.0 * step)));
            } else {
                let v = (param - self.layout.first_pose()) / N_POSE;
                let (start, end) = (self.offsets[v], self.offsets[v + 1]);
                let mut rp = vec![0.0; end - start];
                let mut rm = vec![0.0; end - start];
                xp[col] = orig + step;
                self.view_residuals(&self.layout.scatter(&self.base, &xp), v, &mut rp);
                xp[col] = orig - step;
                self.view_residuals(&self.layout.scatter(&self.base, &xp), v, &mut rm);
                xp[col] = orig;
                for (row, (a, b)) in rp.iter().zip(&rm).enumerate() {
                    jac[(start + row, col)] = (a - b) / (2.0 * step);
                }
            }
        }
        jac
    }
}

// `levenberg-marquardt` is built on its own `nalgebra` release, so vectors
// cross this impl as plain slices.
impl LeastSquaresProblem<f64, Dyn, Dyn> for PlanarProblem<'_> {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, x: &lm_nalgebra::DVector<f64>) {
        self.x.as_mut_slice().copy_from_slice(x.as_slice());
    }

    fn params(&self) -> lm_nalgebra::DVector<f64> {
        lm_nalgebra::DVector::from_column_slice(self.x.as_slice())
    }

    fn residuals(&self) -> Option<lm_nalgebra::DVector<f64>> {
        let (r, _) = self.residual_vector();
        Some(lm_nalgebra::DVector::from_column_slice(r.as_slice()))
    }

    fn jacobian(&self) -> Option<lm_nalgebra::DMatrix<f64>> {
        let jac = self.numeric_jacobian();
        Some(lm_nalgebra::DMatrix::from_column_slice(
            jac.nrows(),
            jac.ncols(),
            jac.as_slice(),
        ))
    }
}
