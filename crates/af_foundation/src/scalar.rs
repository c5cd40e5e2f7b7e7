// crates/af_foundation/src/scalar.rs

//! 泛型标量抽象与前向模式导数追踪
//!
//! 装配核心只写一次，通过 [`Scalar`] trait 按标量类型实例化：
//! 生产运行用 `f64`（或低精度实验用 `f32`），灵敏度验证用 [`Dual`]。
//!
//! [`Dual`] 是一阶前向模式对偶数 `val + der·ε`（ε² = 0），对其做普通
//! 算术即同时传播函数值与方向导数。比较运算只看 `val` 分量，保证
//! `min`/`max`/分支逻辑与 `f64` 运行走完全相同的路径。
//!
//! # 示例
//!
//! ```
//! use af_foundation::scalar::{Dual, Scalar};
//!
//! let x = Dual::variable(3.0);
//! let y = x * x;
//! assert_eq!(y.val, 9.0);
//! assert_eq!(y.der, 6.0); // d(x²)/dx = 2x
//! ```

use std::fmt;
use std::iter::Sum;
use std::num::FpCategory;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Rem, RemAssign, Sub, SubAssign};

use num_traits::{Float, FromPrimitive, Num, NumAssign, NumCast, One, ToPrimitive, Zero};

// ========================================================================
// Scalar trait
// ========================================================================

/// 求解器标量类型约束
///
/// 几何量始终以 `f64` 存储，进入装配表达式时用 [`Scalar::lift`] 提升；
/// 需要落回 `f64`（通信打包、日志、收敛判据）时用 [`Scalar::lower`]。
pub trait Scalar:
    Float
    + FromPrimitive
    + ToPrimitive
    + NumAssign
    + Copy
    + fmt::Debug
    + fmt::Display
    + Default
    + Send
    + Sync
    + Sum
    + 'static
{
    /// 零值
    const ZERO: Self;
    /// 单位值
    const ONE: Self;
    /// 二
    const TWO: Self;
    /// 二分之一
    const HALF: Self;

    /// 由 `f64` 提升（导数分量为零）
    fn lift(value: f64) -> Self;

    /// 落回 `f64`（丢弃导数分量）
    fn lower(self) -> f64;
}

macro_rules! impl_scalar_float {
    ($t:ty) => {
        impl Scalar for $t {
            const ZERO: Self = 0.0;
            const ONE: Self = 1.0;
            const TWO: Self = 2.0;
            const HALF: Self = 0.5;

            #[inline]
            fn lift(value: f64) -> Self {
                value as $t
            }

            #[inline]
            fn lower(self) -> f64 {
                self as f64
            }
        }
    };
}

impl_scalar_float!(f32);
impl_scalar_float!(f64);

// ========================================================================
// 对偶数
// ========================================================================

/// 一阶前向模式对偶数
///
/// 表示 `val + der·ε`，其中 ε² = 0。算术运算同时传播函数值和对
/// 某个标量输入的方向导数。
#[derive(Debug, Clone, Copy, Default)]
pub struct Dual {
    /// 函数值分量
    pub val: f64,
    /// 导数分量
    pub der: f64,
}

impl Dual {
    /// 常量（导数为零）
    #[inline]
    pub const fn constant(val: f64) -> Self {
        Self { val, der: 0.0 }
    }

    /// 自变量（导数播种为一）
    #[inline]
    pub const fn variable(val: f64) -> Self {
        Self { val, der: 1.0 }
    }

    /// 指定值与导数
    #[inline]
    pub const fn new(val: f64, der: f64) -> Self {
        Self { val, der }
    }
}

impl fmt::Display for Dual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}ε", self.val, self.der)
    }
}

// 比较只看值分量：分支逻辑必须与纯 f64 运行一致
impl PartialEq for Dual {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.val == other.val
    }
}

impl PartialOrd for Dual {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.val.partial_cmp(&other.val)
    }
}

// ------------------------------------------------------------------------
// 算术运算
// ------------------------------------------------------------------------

impl Neg for Dual {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.val, -self.der)
    }
}

impl Add for Dual {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.val + rhs.val, self.der + rhs.der)
    }
}

impl Sub for Dual {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.val - rhs.val, self.der - rhs.der)
    }
}

impl Mul for Dual {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.val * rhs.val,
            self.der * rhs.val + self.val * rhs.der,
        )
    }
}

impl Div for Dual {
    type Output = Self;
    #[inline]
    fn div(self, rhs: Self) -> Self {
        Self::new(
            self.val / rhs.val,
            (self.der * rhs.val - self.val * rhs.der) / (rhs.val * rhs.val),
        )
    }
}

impl Rem for Dual {
    type Output = Self;
    #[inline]
    fn rem(self, rhs: Self) -> Self {
        // x mod y = x - y·trunc(x/y)，trunc 的导数几乎处处为零
        Self::new(
            self.val % rhs.val,
            self.der - rhs.der * (self.val / rhs.val).trunc(),
        )
    }
}

impl AddAssign for Dual {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for Dual {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl MulAssign for Dual {
    #[inline]
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl DivAssign for Dual {
    #[inline]
    fn div_assign(&mut self, rhs: Self) {
        *self = *self / rhs;
    }
}

impl RemAssign for Dual {
    #[inline]
    fn rem_assign(&mut self, rhs: Self) {
        *self = *self % rhs;
    }
}

impl Sum for Dual {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::constant(0.0), |acc, x| acc + x)
    }
}

// ------------------------------------------------------------------------
// num-traits 层次
// ------------------------------------------------------------------------

impl Zero for Dual {
    #[inline]
    fn zero() -> Self {
        Self::constant(0.0)
    }

    #[inline]
    fn is_zero(&self) -> bool {
        self.val == 0.0
    }
}

impl One for Dual {
    #[inline]
    fn one() -> Self {
        Self::constant(1.0)
    }
}

impl Num for Dual {
    type FromStrRadixErr = <f64 as Num>::FromStrRadixErr;

    fn from_str_radix(str: &str, radix: u32) -> Result<Self, Self::FromStrRadixErr> {
        f64::from_str_radix(str, radix).map(Self::constant)
    }
}

impl ToPrimitive for Dual {
    #[inline]
    fn to_i64(&self) -> Option<i64> {
        self.val.to_i64()
    }

    #[inline]
    fn to_u64(&self) -> Option<u64> {
        self.val.to_u64()
    }

    #[inline]
    fn to_f64(&self) -> Option<f64> {
        Some(self.val)
    }
}

impl FromPrimitive for Dual {
    #[inline]
    fn from_i64(n: i64) -> Option<Self> {
        Some(Self::constant(n as f64))
    }

    #[inline]
    fn from_u64(n: u64) -> Option<Self> {
        Some(Self::constant(n as f64))
    }

    #[inline]
    fn from_f64(n: f64) -> Option<Self> {
        Some(Self::constant(n))
    }
}

impl NumCast for Dual {
    #[inline]
    fn from<T: ToPrimitive>(n: T) -> Option<Self> {
        n.to_f64().map(Self::constant)
    }
}

impl Float for Dual {
    #[inline]
    fn nan() -> Self {
        Self::constant(f64::NAN)
    }

    #[inline]
    fn infinity() -> Self {
        Self::constant(f64::INFINITY)
    }

    #[inline]
    fn neg_infinity() -> Self {
        Self::constant(f64::NEG_INFINITY)
    }

    #[inline]
    fn neg_zero() -> Self {
        Self::constant(-0.0)
    }

    #[inline]
    fn min_value() -> Self {
        Self::constant(f64::MIN)
    }

    #[inline]
    fn min_positive_value() -> Self {
        Self::constant(f64::MIN_POSITIVE)
    }

    #[inline]
    fn max_value() -> Self {
        Self::constant(f64::MAX)
    }

    #[inline]
    fn epsilon() -> Self {
        Self::constant(f64::EPSILON)
    }

    #[inline]
    fn is_nan(self) -> bool {
        self.val.is_nan()
    }

    #[inline]
    fn is_infinite(self) -> bool {
        self.val.is_infinite()
    }

    #[inline]
    fn is_finite(self) -> bool {
        self.val.is_finite()
    }

    #[inline]
    fn is_normal(self) -> bool {
        self.val.is_normal()
    }

    #[inline]
    fn classify(self) -> FpCategory {
        self.val.classify()
    }

    #[inline]
    fn floor(self) -> Self {
        Self::constant(self.val.floor())
    }

    #[inline]
    fn ceil(self) -> Self {
        Self::constant(self.val.ceil())
    }

    #[inline]
    fn round(self) -> Self {
        Self::constant(self.val.round())
    }

    #[inline]
    fn trunc(self) -> Self {
        Self::constant(self.val.trunc())
    }

    #[inline]
    fn fract(self) -> Self {
        Self::new(self.val.fract(), self.der)
    }

    #[inline]
    fn abs(self) -> Self {
        if self.val < 0.0 {
            -self
        } else {
            self
        }
    }

    #[inline]
    fn signum(self) -> Self {
        Self::constant(self.val.signum())
    }

    #[inline]
    fn is_sign_positive(self) -> bool {
        self.val.is_sign_positive()
    }

    #[inline]
    fn is_sign_negative(self) -> bool {
        self.val.is_sign_negative()
    }

    #[inline]
    fn mul_add(self, a: Self, b: Self) -> Self {
        Self::new(
            self.val.mul_add(a.val, b.val),
            self.der * a.val + self.val * a.der + b.der,
        )
    }

    #[inline]
    fn recip(self) -> Self {
        Self::new(self.val.recip(), -self.der / (self.val * self.val))
    }

    #[inline]
    fn powi(self, n: i32) -> Self {
        Self::new(
            self.val.powi(n),
            <f64 as From<i32>>::from(n) * self.val.powi(n - 1) * self.der,
        )
    }

    fn powf(self, n: Self) -> Self {
        let v = self.val.powf(n.val);
        let mut d = n.val * self.val.powf(n.val - 1.0) * self.der;
        if n.der != 0.0 {
            d += v * self.val.ln() * n.der;
        }
        Self::new(v, d)
    }

    #[inline]
    fn sqrt(self) -> Self {
        let r = self.val.sqrt();
        Self::new(r, self.der / (2.0 * r))
    }

    #[inline]
    fn exp(self) -> Self {
        let e = self.val.exp();
        Self::new(e, self.der * e)
    }

    #[inline]
    fn exp2(self) -> Self {
        let e = self.val.exp2();
        Self::new(e, self.der * e * std::f64::consts::LN_2)
    }

    #[inline]
    fn ln(self) -> Self {
        Self::new(self.val.ln(), self.der / self.val)
    }

    #[inline]
    fn log(self, base: Self) -> Self {
        self.ln() / base.ln()
    }

    #[inline]
    fn log2(self) -> Self {
        Self::new(self.val.log2(), self.der / (self.val * std::f64::consts::LN_2))
    }

    #[inline]
    fn log10(self) -> Self {
        Self::new(
            self.val.log10(),
            self.der / (self.val * std::f64::consts::LN_10),
        )
    }

    #[inline]
    fn max(self, other: Self) -> Self {
        if self.val >= other.val {
            self
        } else {
            other
        }
    }

    #[inline]
    fn min(self, other: Self) -> Self {
        if self.val <= other.val {
            self
        } else {
            other
        }
    }

    #[inline]
    fn abs_sub(self, other: Self) -> Self {
        if self.val > other.val {
            self - other
        } else {
            Self::constant(0.0)
        }
    }

    #[inline]
    fn cbrt(self) -> Self {
        let r = self.val.cbrt();
        Self::new(r, self.der / (3.0 * r * r))
    }

    #[inline]
    fn hypot(self, other: Self) -> Self {
        let h = self.val.hypot(other.val);
        Self::new(h, (self.val * self.der + other.val * other.der) / h)
    }

    #[inline]
    fn sin(self) -> Self {
        Self::new(self.val.sin(), self.der * self.val.cos())
    }

    #[inline]
    fn cos(self) -> Self {
        Self::new(self.val.cos(), -self.der * self.val.sin())
    }

    #[inline]
    fn tan(self) -> Self {
        let c = self.val.cos();
        Self::new(self.val.tan(), self.der / (c * c))
    }

    #[inline]
    fn asin(self) -> Self {
        Self::new(
            self.val.asin(),
            self.der / (1.0 - self.val * self.val).sqrt(),
        )
    }

    #[inline]
    fn acos(self) -> Self {
        Self::new(
            self.val.acos(),
            -self.der / (1.0 - self.val * self.val).sqrt(),
        )
    }

    #[inline]
    fn atan(self) -> Self {
        Self::new(self.val.atan(), self.der / (1.0 + self.val * self.val))
    }

    #[inline]
    fn atan2(self, other: Self) -> Self {
        let denom = self.val * self.val + other.val * other.val;
        Self::new(
            self.val.atan2(other.val),
            (self.der * other.val - self.val * other.der) / denom,
        )
    }

    #[inline]
    fn sin_cos(self) -> (Self, Self) {
        (self.sin(), self.cos())
    }

    #[inline]
    fn exp_m1(self) -> Self {
        Self::new(self.val.exp_m1(), self.der * self.val.exp())
    }

    #[inline]
    fn ln_1p(self) -> Self {
        Self::new(self.val.ln_1p(), self.der / (1.0 + self.val))
    }

    #[inline]
    fn sinh(self) -> Self {
        Self::new(self.val.sinh(), self.der * self.val.cosh())
    }

    #[inline]
    fn cosh(self) -> Self {
        Self::new(self.val.cosh(), self.der * self.val.sinh())
    }

    #[inline]
    fn tanh(self) -> Self {
        let t = self.val.tanh();
        Self::new(t, self.der * (1.0 - t * t))
    }

    #[inline]
    fn asinh(self) -> Self {
        Self::new(
            self.val.asinh(),
            self.der / (self.val * self.val + 1.0).sqrt(),
        )
    }

    #[inline]
    fn acosh(self) -> Self {
        Self::new(
            self.val.acosh(),
            self.der / (self.val * self.val - 1.0).sqrt(),
        )
    }

    #[inline]
    fn atanh(self) -> Self {
        Self::new(self.val.atanh(), self.der / (1.0 - self.val * self.val))
    }

    #[inline]
    fn integer_decode(self) -> (u64, i16, i8) {
        self.val.integer_decode()
    }
}

impl Scalar for Dual {
    const ZERO: Self = Self::constant(0.0);
    const ONE: Self = Self::constant(1.0);
    const TWO: Self = Self::constant(2.0);
    const HALF: Self = Self::constant(0.5);

    #[inline]
    fn lift(value: f64) -> Self {
        Self::constant(value)
    }

    #[inline]
    fn lower(self) -> f64 {
        self.val
    }
}

// ========================================================================
// 测试
// ========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn test_lift_lower_f64() {
        let x = f64::lift(2.5);
        assert_eq!(x, 2.5);
        assert_eq!(x.lower(), 2.5);
    }

    #[test]
    fn test_dual_arithmetic() {
        let x = Dual::variable(3.0);
        let c = Dual::constant(2.0);

        let y = x * x + c * x; // x² + 2x
        assert!((y.val - 15.0).abs() < EPS);
        assert!((y.der - 8.0).abs() < EPS); // 2x + 2

        let q = c / x;
        assert!((q.der + 2.0 / 9.0).abs() < EPS); // -2/x²
    }

    #[test]
    fn test_dual_sqrt() {
        let x = Dual::variable(4.0);
        let y = x.sqrt();
        assert!((y.val - 2.0).abs() < EPS);
        assert!((y.der - 0.25).abs() < EPS); // 1/(2√x)
    }

    #[test]
    fn test_dual_exp_ln() {
        let x = Dual::variable(2.0);
        let y = x.ln();
        assert!((y.der - 0.5).abs() < EPS);

        let z = x.exp();
        assert!((z.der - 2.0f64.exp()).abs() < 1e-10);
    }

    #[test]
    fn test_dual_min_max_branch() {
        // min/max 按值分量取支，导数跟随所选支
        let a = Dual::new(1.0, 10.0);
        let b = Dual::new(2.0, 20.0);
        assert_eq!(a.min(b).der, 10.0);
        assert_eq!(a.max(b).der, 20.0);
        // 相等时 max 取 self，min 取 self
        let c = Dual::new(1.0, 30.0);
        assert_eq!(a.max(c).der, 10.0);
    }

    #[test]
    fn test_dual_abs() {
        let x = Dual::new(-2.0, 1.0);
        let y = x.abs();
        assert_eq!(y.val, 2.0);
        assert_eq!(y.der, -1.0);
    }

    #[test]
    fn test_dual_powi() {
        let x = Dual::variable(2.0);
        let y = x.powi(3);
        assert!((y.val - 8.0).abs() < EPS);
        assert!((y.der - 12.0).abs() < EPS); // 3x²
    }

    #[test]
    fn test_dual_comparison_ignores_der() {
        let a = Dual::new(1.0, 5.0);
        let b = Dual::new(1.0, -5.0);
        assert_eq!(a, b);
        assert!(Dual::new(0.5, 0.0) < a);
    }

    #[test]
    fn test_dual_sum() {
        let s: Dual = (0..4).map(|i| Dual::new(i as f64, 1.0)).sum();
        assert_eq!(s.val, 6.0);
        assert_eq!(s.der, 4.0);
    }

    #[test]
    fn test_dual_finite_difference_check() {
        // 对复合表达式用中心差分验证导数传播
        fn f<S: Scalar>(x: S) -> S {
            (x * x + S::ONE).sqrt() * x.exp() / (x + S::TWO)
        }

        let x0 = 0.7;
        let h = 1e-6;
        let fd = (f(x0 + h) - f(x0 - h)) / (2.0 * h);
        let ad = f(Dual::variable(x0)).der;
        assert!((fd - ad).abs() < 1e-8, "fd={fd}, ad={ad}");
    }

    #[test]
    fn test_dual_hypot_atan2() {
        let x = Dual::variable(3.0);
        let y = Dual::constant(4.0);
        let h = x.hypot(y);
        assert!((h.val - 5.0).abs() < EPS);
        assert!((h.der - 0.6).abs() < EPS); // x/hypot

        let t = y.atan2(x);
        assert!((t.der - (-4.0 / 25.0)).abs() < EPS);
    }
}
