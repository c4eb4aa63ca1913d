/// debug label 使用的颜色
pub struct LabelColor;
impl LabelColor {
    const RED: glam::Vec4 = glam::vec4(1.0, 0.0, 0.0, 1.0);
    const GREEN: glam::Vec4 = glam::vec4(0.0, 1.0, 0.0, 1.0);
    const BLUE: glam::Vec4 = glam::vec4(0.0, 0.0, 1.0, 1.0);
    const YELLOW: glam::Vec4 = glam::vec4(1.0, 1.0, 0.0, 1.0);
    const MAGENTA: glam::Vec4 = glam::vec4(1.0, 0.0, 1.0, 1.0);

    /// 一个完整的 pass，例如 depth prepass
    pub const COLOR_PASS: glam::Vec4 = Self::BLUE;
    /// pass 内部的阶段，例如某个 outline 的 seed
    pub const COLOR_STAGE: glam::Vec4 = Self::YELLOW;
    /// command buffer 整体
    pub const COLOR_CMD: glam::Vec4 = Self::GREEN;
    /// compute 相关
    pub const COLOR_COMPUTE: glam::Vec4 = Self::MAGENTA;
    /// 资源重建等少见的阻塞操作
    pub const COLOR_REBUILD: glam::Vec4 = Self::RED;
}
