//! # 几何工具模块
//!
//! 提供计算刚体惯性张量的工具函数

use bevy::math::Vec3;

/// 计算长方体关于质心的主转动惯量
///
/// ## 参数
/// - `half_extents`: 半边长 (m)
/// - `mass`: 质量 (kg)
///
/// ## 返回值
/// 主轴惯量对角 `(Ixx, Iyy, Izz)` (kg·m²)，质量为零时返回零
///
/// ## 数学推导
///
/// 边长 `l = 2h`:
/// ```text
/// Ixx = m/12 * (ly² + lz²)
/// Iyy = m/12 * (lx² + lz²)
/// Izz = m/12 * (lx² + ly²)
/// ```
pub fn box_inertia(half_extents: Vec3, mass: f32) -> Vec3 {
    let l = half_extents * 2.0;
    let (lx2, ly2, lz2) = (l.x * l.x, l.y * l.y, l.z * l.z);
    Vec3::new(ly2 + lz2, lx2 + lz2, lx2 + ly2) * (mass / 12.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_box_inertia() {
        // 连杆尺寸: 0.1 x 0.74 x 0.2, 质量 1kg
        let inertia = box_inertia(Vec3::new(0.05, 0.37, 0.1), 1.0);

        assert_relative_eq!(inertia.x, (0.74 * 0.74 + 0.2 * 0.2) / 12.0, epsilon = 1e-6);
        assert_relative_eq!(inertia.y, (0.1 * 0.1 + 0.2 * 0.2) / 12.0, epsilon = 1e-6);
        assert_relative_eq!(inertia.z, (0.1 * 0.1 + 0.74 * 0.74) / 12.0, epsilon = 1e-6);
    }

    #[test]
    fn test_cube_inertia_is_isotropic() {
        let inertia = box_inertia(Vec3::splat(0.5), 1.0);
        assert_relative_eq!(inertia.x, 1.0 / 6.0, epsilon = 1e-6);
        assert_relative_eq!(inertia.x, inertia.y);
        assert_relative_eq!(inertia.y, inertia.z);
    }

    #[test]
    fn test_static_box_has_no_inertia() {
        assert_eq!(box_inertia(Vec3::splat(50.0), 0.0), Vec3::ZERO);
    }
}
