//! 有理数类型, 用于帧率与像素宽高比.

use std::fmt;
use std::str::FromStr;

use crate::error::FeedError;

/// 有理数, 由分子和分母组成
///
/// 例如: 帧率 30/1, 像素宽高比 1/1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    /// 分子
    pub num: i32,
    /// 分母
    pub den: i32,
}

impl Rational {
    /// 创建新的有理数
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// 未定义 (分母为 0)
    pub const UNDEFINED: Self = Self { num: 0, den: 0 };

    /// 判断是否有效 (分母不为 0)
    pub const fn is_valid(&self) -> bool {
        self.den != 0
    }

    /// 转换为 f64 浮点数
    ///
    /// 如果分母为 0, 返回 `f64::NAN`.
    pub fn to_f64(self) -> f64 {
        if self.den == 0 {
            return f64::NAN;
        }
        f64::from(self.num) / f64::from(self.den)
    }

    /// 对有理数进行约分
    pub fn reduce(self) -> Self {
        if self.den == 0 {
            return self;
        }
        let g = gcd(self.num.unsigned_abs(), self.den.unsigned_abs());
        if g == 0 {
            return self;
        }
        let g = g as i32;
        // 保证分母为正
        let sign = if self.den < 0 { -1 } else { 1 };
        Self {
            num: sign * self.num / g,
            den: sign * self.den / g,
        }
    }

    /// 把本值当作帧率, 计算一帧在 `clock_rate` Hz 时钟下的时长
    ///
    /// 帧率无效或非正时返回 `None`.
    pub fn frame_duration(&self, clock_rate: i64) -> Option<i64> {
        if self.num <= 0 || self.den <= 0 {
            return None;
        }
        Some(clock_rate * i64::from(self.den) / i64::from(self.num))
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl FromStr for Rational {
    type Err = FeedError;

    /// 解析 `"30/1"` 或 `"25"` 形式
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || FeedError::InvalidArgument(format!("无效的有理数: {s}"));
        match s.split_once('/') {
            Some((n, d)) => {
                let num = n.trim().parse::<i32>().map_err(|_| bad())?;
                let den = d.trim().parse::<i32>().map_err(|_| bad())?;
                Ok(Self::new(num, den))
            }
            None => Ok(Self::new(s.trim().parse::<i32>().map_err(|_| bad())?, 1)),
        }
    }
}

impl From<(i32, i32)> for Rational {
    fn from((num, den): (i32, i32)) -> Self {
        Self { num, den }
    }
}

/// 求最大公约数 (欧几里得算法)
fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}
