use nalgebra::Matrix2;
use nalgebra_sparse::convert::serial::convert_dense_coo;
use nalgebra_sparse::{coo::CooMatrix, csr::CsrMatrix};
use num_complex::Complex;

use crate::Qbit;

fn from_dense(matrix: Matrix2<Qbit>) -> CsrMatrix<Qbit> {
    CsrMatrix::from(&convert_dense_coo(&matrix))
}

pub fn h_matrix() -> CsrMatrix<Qbit> {
    let root2 = 2.0_f64.sqrt();
    let one = Complex::new(1.0, 0.0);
    from_dense(Matrix2::from_row_slice(&[
        one / root2,
        one / root2,
        one / root2,
        -one / root2,
    ]))
}

pub fn x_matrix() -> CsrMatrix<Qbit> {
    let mut x_coo = CooMatrix::new(2, 2);
    x_coo.push(0, 1, Complex::new(1.0, 0.0));
    x_coo.push(1, 0, Complex::new(1.0, 0.0));
    CsrMatrix::from(&x_coo)
}

pub fn y_matrix() -> CsrMatrix<Qbit> {
    let mut y_coo = CooMatrix::new(2, 2);
    y_coo.push(0, 1, Complex::new(0.0, -1.0));
    y_coo.push(1, 0, Complex::new(0.0, 1.0));
    CsrMatrix::from(&y_coo)
}

pub fn z_matrix() -> CsrMatrix<Qbit> {
    let mut z_coo = CooMatrix::new(2, 2);
    z_coo.push(0, 0, Complex::new(1.0, 0.0));
    z_coo.push(1, 1, Complex::new(-1.0, 0.0));
    CsrMatrix::from(&z_coo)
}

pub fn s_matrix() -> CsrMatrix<Qbit> {
    let mut s_coo = CooMatrix::new(2, 2);
    s_coo.push(0, 0, Complex::new(1.0, 0.0));
    s_coo.push(1, 1, Complex::new(0.0, 1.0));
    CsrMatrix::from(&s_coo)
}

pub fn t_matrix() -> CsrMatrix<Qbit> {
    let mut t_coo = CooMatrix::new(2, 2);
    t_coo.push(0, 0, Complex::new(1.0, 0.0));
    t_coo.push(1, 1, Complex::from_polar(1.0, std::f64::consts::FRAC_PI_4));
    CsrMatrix::from(&t_coo)
}

/// RX(θ) = exp(-iθX/2)
pub fn rx_matrix(angle: f64) -> CsrMatrix<Qbit> {
    let c = Complex::new((angle / 2.0).cos(), 0.0);
    let s = Complex::new(0.0, -(angle / 2.0).sin());
    from_dense(Matrix2::from_row_slice(&[c, s, s, c]))
}

/// RY(θ) = exp(-iθY/2)
pub fn ry_matrix(angle: f64) -> CsrMatrix<Qbit> {
    let c = Complex::new((angle / 2.0).cos(), 0.0);
    let s = Complex::new((angle / 2.0).sin(), 0.0);
    from_dense(Matrix2::from_row_slice(&[c, -s, s, c]))
}

/// RZ(θ) = exp(-iθZ/2)
pub fn rz_matrix(angle: f64) -> CsrMatrix<Qbit> {
    let mut rz_coo = CooMatrix::new(2, 2);
    rz_coo.push(0, 0, Complex::from_polar(1.0, -angle / 2.0));
    rz_coo.push(1, 1, Complex::from_polar(1.0, angle / 2.0));
    CsrMatrix::from(&rz_coo)
}
