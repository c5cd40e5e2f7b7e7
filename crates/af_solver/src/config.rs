// crates/af_solver/src/config.rs

//! 求解器配置
//!
//! 所有离散选项用枚举表达，边界类型在构建期解析为 [`WallKind`]，
//! 装配热路径按枚举分派，不做字符串比较。

use serde::{Deserialize, Serialize};

use af_foundation::{ensure, AfError, AfResult};

// ========================================================================
// 离散选项枚举
// ========================================================================

/// 时间积分格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeScheme {
    /// 一阶隐式欧拉（装配雅可比）
    #[default]
    EulerImplicit,
    /// 显式欧拉
    EulerExplicit,
}

/// 时间推进模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeMarching {
    /// 定常（局部时间步）
    #[default]
    Steady,
    /// 双时间步（内迭代伪时间 + 外层物理时间）
    DualTime,
    /// 全局时间步非定常
    TimeStepping,
}

/// 对流通量格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConvectiveScheme {
    /// 通量差分分裂
    #[default]
    Fds,
    /// 迎风二阶（带限制器重构）
    Upwind2,
    /// 中心 + 人工耗散
    Jst,
}

/// 梯度重构方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GradientMethod {
    /// 格林-高斯
    #[default]
    GreenGauss,
    /// 加权最小二乘
    WeightedLeastSquares,
}

/// 壁面函数处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WallFunctionKind {
    /// 不使用壁面函数（低雷诺数积分到壁面）
    #[default]
    None,
    /// 标准壁面函数
    StandardWallFunction,
    /// 自适应壁面函数
    AdaptiveWallFunction,
}

/// 共轭传热界面的耦合方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChtCouplingKind {
    /// 平均壁温 + Neumann 回传
    AveragedNeumann,
    /// 平均壁温 + Robin 回传
    AveragedRobin,
    /// 直接取对侧温度 + Neumann 回传
    DirectNeumann,
    /// 直接取对侧温度 + Robin 回传
    DirectRobin,
}

impl ChtCouplingKind {
    /// 是否用双侧导热加权平均计算壁温
    pub fn is_averaged(self) -> bool {
        matches!(self, Self::AveragedNeumann | Self::AveragedRobin)
    }
}

// ========================================================================
// 标记配置
// ========================================================================

/// 壁面边界类型
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WallKind {
    /// 给定热流（绝热为 0）
    HeatFlux {
        /// 壁面热流密度（物理单位，装配时除以参考热流）
        flux: f64,
    },
    /// 给定壁温
    Isothermal {
        /// 壁面温度（物理单位，装配时除以参考温度）
        twall: f64,
    },
    /// 共轭传热界面（壁温由对侧求解器提供）
    ConjugateHeat {
        /// 耦合方式
        coupling: ChtCouplingKind,
    },
}

/// 单个边界标记的配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerConfig {
    /// 标记名（与网格标记对应）
    pub name: String,
    /// 壁面类型
    pub wall: WallKind,
    /// 壁面函数处理
    pub wall_function: WallFunctionKind,
    /// 是否为运动壁面（速度取网格速度而非零）
    pub moving_wall: bool,
}

impl MarkerConfig {
    /// 给定热流的壁面
    pub fn heat_flux(name: impl Into<String>, flux: f64) -> Self {
        Self {
            name: name.into(),
            wall: WallKind::HeatFlux { flux },
            wall_function: WallFunctionKind::default(),
            moving_wall: false,
        }
    }

    /// 等温壁面
    pub fn isothermal(name: impl Into<String>, twall: f64) -> Self {
        Self {
            name: name.into(),
            wall: WallKind::Isothermal { twall },
            wall_function: WallFunctionKind::default(),
            moving_wall: false,
        }
    }

    /// 共轭传热界面
    pub fn conjugate_heat(name: impl Into<String>, coupling: ChtCouplingKind) -> Self {
        Self {
            name: name.into(),
            wall: WallKind::ConjugateHeat { coupling },
            wall_function: WallFunctionKind::default(),
            moving_wall: false,
        }
    }

    /// 标记为运动壁面
    pub fn with_moving_wall(mut self) -> Self {
        self.moving_wall = true;
        self
    }

    /// 设置壁面函数处理
    pub fn with_wall_function(mut self, kind: WallFunctionKind) -> Self {
        self.wall_function = kind;
        self
    }
}

// ========================================================================
// 参考量与求解器配置
// ========================================================================

/// 无量纲化参考量
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReferenceValues {
    /// 参考温度
    pub temperature: f64,
    /// 参考粘性
    pub viscosity: f64,
    /// 参考热流
    pub heat_flux: f64,
}

impl Default for ReferenceValues {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            viscosity: 1.0,
            heat_flux: 1.0,
        }
    }
}

/// 求解器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// 时间积分格式
    pub time_scheme: TimeScheme,
    /// 时间推进模式
    pub time_marching: TimeMarching,
    /// 对流格式
    pub convective_scheme: ConvectiveScheme,
    /// 梯度重构方法
    pub gradient_method: GradientMethod,
    /// CFL 数
    pub cfl: f64,
    /// 非定常 CFL（双时间步外层；0 表示物理时间步由配置给定）
    pub unsteady_cfl: f64,
    /// 时间步上限
    pub max_dt: f64,
    /// 物理时间步（双时间步/全局时间步）
    pub physical_dt: f64,
    /// 是否求解能量方程
    pub energy: bool,
    /// 无量纲化参考量
    pub reference: ReferenceValues,
    /// 共轭传热耦合数据的松弛因子
    pub cht_relaxation: f64,
    /// 边界标记配置
    pub markers: Vec<MarkerConfig>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            time_scheme: TimeScheme::default(),
            time_marching: TimeMarching::default(),
            convective_scheme: ConvectiveScheme::default(),
            gradient_method: GradientMethod::default(),
            cfl: 10.0,
            unsteady_cfl: 0.0,
            max_dt: 1e30,
            physical_dt: 0.0,
            energy: true,
            reference: ReferenceValues::default(),
            cht_relaxation: 1.0,
            markers: Vec::new(),
        }
    }
}

impl SolverConfig {
    /// 是否隐式时间积分
    #[inline]
    pub fn is_implicit(&self) -> bool {
        self.time_scheme == TimeScheme::EulerImplicit
    }

    /// 是否双时间步
    #[inline]
    pub fn is_dual_time(&self) -> bool {
        self.time_marching == TimeMarching::DualTime
    }

    /// 按名称查找标记配置
    pub fn marker_by_name(&self, name: &str) -> Option<&MarkerConfig> {
        self.markers.iter().find(|m| m.name == name)
    }

    /// 校验配置合法性
    pub fn validate(&self) -> AfResult<()> {
        ensure!(
            self.cfl > 0.0,
            AfError::invalid_config("cfl", self.cfl.to_string(), "必须为正")
        );
        ensure!(
            self.unsteady_cfl >= 0.0,
            AfError::invalid_config("unsteady_cfl", self.unsteady_cfl.to_string(), "不能为负")
        );
        ensure!(
            self.max_dt > 0.0,
            AfError::invalid_config("max_dt", self.max_dt.to_string(), "必须为正")
        );
        ensure!(
            self.cht_relaxation > 0.0 && self.cht_relaxation <= 1.0,
            AfError::invalid_config(
                "cht_relaxation",
                self.cht_relaxation.to_string(),
                "必须在 (0, 1] 内"
            )
        );
        if self.time_marching != TimeMarching::Steady && self.unsteady_cfl == 0.0 {
            ensure!(
                self.physical_dt > 0.0,
                AfError::invalid_config(
                    "physical_dt",
                    self.physical_dt.to_string(),
                    "非定常且 unsteady_cfl=0 时必须给定"
                )
            );
        }
        for m in &self.markers {
            ensure!(
                !m.name.is_empty(),
                AfError::config("标记名不能为空")
            );
        }
        Ok(())
    }
}

// ========================================================================
// 测试
// ========================================================================
