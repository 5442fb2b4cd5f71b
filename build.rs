// 构建脚本: 静态链接 FFmpeg 时补齐系统库
fn main() {
    // vcpkg 的 FFmpeg 静态库只在 Windows MSVC 下需要额外链接
    #[cfg(all(target_os = "windows", target_env = "msvc"))]
    {
        // vcpkg 默认 FFmpeg 特性带入的编码器 (Intel QSV / x264)
        println!("cargo:rustc-link-lib=dylib=libmfx");
        println!("cargo:rustc-link-lib=dylib=libx264");

        // DirectShow 摄像头采集
        println!("cargo:rustc-link-lib=dylib=oleaut32");
        println!("cargo:rustc-link-lib=dylib=vfw32");
        println!("cargo:rustc-link-lib=dylib=strmiids");

        // 模型下载 (Secure Channel)
        println!("cargo:rustc-link-lib=dylib=secur32");
    }
}
