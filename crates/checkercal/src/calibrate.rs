use checkercal_core::{
    CalibError, CalibrationResult, CalibrationSession, CalibrationSolver, Projector, SolverOutput,
};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Run the solver once over a reconciled session.
///
/// Solver failures, and outputs whose pose count does not match the view
/// count, become [`CalibError::CalibrationSolver`].
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip_all, fields(views = session.view_count()))
)]
pub fn run_solver<S>(session: &CalibrationSession, solver: &S) -> Result<SolverOutput, CalibError>
where
    S: CalibrationSolver + ?Sized,
{
    let output = solver
        .calibrate(
            session.object_points(),
            session.image_points(),
            session.image_size(),
        )
        .map_err(|err| CalibError::CalibrationSolver(err.message))?;

    let views = session.view_count();
    if output.rvecs.len() != views || output.tvecs.len() != views {
        return Err(CalibError::CalibrationSolver(format!(
            "solver returned {} rotations and {} translations for {views} views",
            output.rvecs.len(),
            output.tvecs.len()
        )));
    }
    log::info!("calibrated {views} views, rms {:.6} px", output.rms);
    Ok(output)
}

/// `sqrt(‖projected − detected‖² / count)` for every view.
pub fn per_view_errors<P>(
    session: &CalibrationSession,
    output: &SolverOutput,
    projector: &P,
) -> Result<Vec<f64>, CalibError>
where
    P: Projector + ?Sized,
{
    let mut errors = Vec::with_capacity(session.view_count());
    for (view, (object, image)) in session
        .object_points()
        .iter()
        .zip(session.image_points())
        .enumerate()
    {
        if image.is_empty() {
            return Err(CalibError::Reprojection {
                view,
                message: "view has no points".to_string(),
            });
        }
        let (Some(rvec), Some(tvec)) = (output.rvecs.get(view), output.tvecs.get(view)) else {
            return Err(CalibError::Reprojection {
                view,
                message: "no pose for this view".to_string(),
            });
        };
        let projected = projector
            .project(object, rvec, tvec, &output.camera_matrix, &output.dist_coeffs)
            .map_err(|err| CalibError::Reprojection {
                view,
                message: err.message,
            })?;
        if projected.len() != image.len() {
            return Err(CalibError::Reprojection {
                view,
                message: format!(
                    "projector returned {} points for {} inputs",
                    projected.len(),
                    image.len()
                ),
            });
        }

        let sum_sq: f64 = projected
            .iter()
            .zip(image)
            .map(|(p, q)| (p - q).norm_squared())
            .sum();
        let err = (sum_sq / image.len() as f64).sqrt();
        log::debug!("view {view}: reprojection error {err:.6} px");
        errors.push(err);
    }
    Ok(errors)
}

/// Solve, then re-project every view.
pub fn calibrate<B>(session: &CalibrationSession, backend: &B) -> Result<CalibrationResult, CalibError>
where
    B: CalibrationSolver + Projector + ?Sized,
{
    let output = run_solver(session, backend)?;
    let per_view_errors = per_view_errors(session, &output, backend)?;
    Ok(CalibrationResult {
        camera_matrix: output.camera_matrix,
        dist_coeffs: output.dist_coeffs,
        rvecs: output.rvecs,
        tvecs: output.tvecs,
        rms: output.rms,
        per_view_errors,
        view_point_counts: session.image_points().iter().map(Vec::len).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkercal_core::{BackendError, ImagePointSet, ImageSize, ObjectPointSet};
    use nalgebra::{Matrix3, Point2, Point3, Vector3};

    /// Identity camera: returns the object's `(x + tx, y + ty)`.
    struct Fake {
        poses: usize,
        fail_solver: bool,
        fail_projection: bool,
    }

    impl CalibrationSolver for Fake {
        fn calibrate(
            &self,
            _object_points: &[ObjectPointSet],
            _image_points: &[ImagePointSet],
            _image_size: ImageSize,
        ) -> Result<SolverOutput, BackendError> {
            if self.fail_solver {
                return Err(BackendError::new("not enough views"));
            }
            Ok(SolverOutput {
                camera_matrix: Matrix3::identity(),
                dist_coeffs: vec![0.0; 5],
                rvecs: vec![Vector3::zeros(); self.poses],
                tvecs: vec![Vector3::new(0.0, 0.0, 1.0); self.poses],
                rms: 0.25,
            })
        }
    }

    impl Projector for Fake {
        fn project(
            &self,
            points: &[Point3<f64>],
            _rvec: &Vector3<f64>,
            tvec: &Vector3<f64>,
            _camera_matrix: &Matrix3<f64>,
            _dist_coeffs: &[f64],
        ) -> Result<Vec<Point2<f64>>, BackendError> {
            if self.fail_projection {
                return Err(BackendError::new("behind the camera"));
            }
            Ok(points
                .iter()
                .map(|p| Point2::new(p.x + tvec.x, p.y + tvec.y))
                .collect())
        }
    }

    fn session() -> CalibrationSession {
        let obj: ObjectPointSet = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        ];
        let exact: ImagePointSet = obj.iter().map(|p| Point2::new(p.x, p.y)).collect();
        let mut off = exact.clone();
        off[0].x += 2.0;
        CalibrationSession::new(vec![exact, off], vec![obj.clone(), obj], ImageSize::new(4, 4))
            .unwrap()
    }

    fn fake() -> Fake {
        Fake {
            poses: 2,
            fail_solver: false,
            fail_projection: false,
        }
    }

    #[test]
    fn per_view_errors_follow_definition() {
        let result = calibrate(&session(), &fake()).unwrap();
        assert_eq!(0.25, result.rms);
        assert_eq!(0.0, result.per_view_errors[0]);
        assert!((result.per_view_errors[1] - (4.0f64 / 4.0).sqrt()).abs() < 1e-12);
        assert_eq!(vec![4, 4], result.view_point_counts);
    }

    #[test]
    fn solver_failure_is_reported_as_solver_error() {
        let err = calibrate(
            &session(),
            &Fake {
                fail_solver: true,
                ..fake()
            },
        )
        .unwrap_err();
        assert_eq!(
            CalibError::CalibrationSolver("not enough views".to_string()),
            err
        );
    }

    #[test]
    fn wrong_pose_count_is_solver_error() {
        let err = calibrate(&session(), &Fake { poses: 1, ..fake() }).unwrap_err();
        assert!(matches!(err, CalibError::CalibrationSolver(_)));
    }

    #[test]
    fn projection_failure_is_reprojection_error() {
        let err = calibrate(
            &session(),
            &Fake {
                fail_projection: true,
                ..fake()
            },
        )
        .unwrap_err();
        assert_eq!(
            CalibError::Reprojection {
                view: 0,
                message: "behind the camera".to_string()
            },
            err
        );
    }

    #[test]
    fn empty_view_is_reprojection_error() {
        let session =
            CalibrationSession::new(vec![vec![]], vec![vec![]], ImageSize::new(4, 4)).unwrap();
        let err = per_view_errors(
            &session,
            &SolverOutput {
                camera_matrix: Matrix3::identity(),
                dist_coeffs: vec![],
                rvecs: vec![Vector3::zeros()],
                tvecs: vec![Vector3::zeros()],
                rms: 0.0,
            },
            &fake(),
        )
        .unwrap_err();
        assert!(matches!(err, CalibError::Reprojection { view: 0, .. }));
    }
}
