use std::path::PathBuf;

use console::Style;
use skyphot_core::lightcurve::LightCurveSet;
use skyphot_core::photometry::flags::describe;
use skyphot_core::pipeline::config::{AperturePlacement, PhotometryConfig};
use skyphot_core::pipeline::Catalog;

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    warning: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            warning: Style::new().dim().yellow(),
            path: Style::new().underlined(),
        }
    }
}

fn format_list<T: ToString>(values: &[T]) -> String {
    values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ")
}

pub fn print_photometry_summary(config: &PhotometryConfig) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Skyphot Photometry"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(18)));
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Input"),
        s.path.apply_to(config.input_dir.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Output"),
        s.path.apply_to(config.output.display())
    );
    println!();

    println!("  {}", s.header.apply_to("Background"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Boxes"),
        s.value.apply_to(format_list(&config.background.box_sizes))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Filters"),
        s.value.apply_to(format_list(&config.background.filter_widths))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Settings"),
        s.value.apply_to(config.background.settings().len())
    );
    println!();

    let radii = config.apertures.radii();
    println!("  {}", s.header.apply_to("Apertures"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Radii"),
        s.value.apply_to(format!(
            "{} from {:.2} to {:.2} px",
            radii.len(),
            radii.first().copied().unwrap_or(f64::NAN),
            radii.last().copied().unwrap_or(f64::NAN)
        ))
    );
    let placement = match config.centroid.placement {
        AperturePlacement::Refined => "windowed centroid",
        AperturePlacement::Registered => "registered catalog",
    };
    println!(
        "    {:<12}{}",
        s.label.apply_to("Placement"),
        s.method.apply_to(placement)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Empty"),
        s.value.apply_to(format!(
            "{} x r={:.1} px",
            config.empty_apertures.count, config.empty_apertures.radius
        ))
    );
    println!();

    println!("  {}", s.header.apply_to("Catalog"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Threshold"),
        s.value.apply_to(format!("{:.1} sigma", config.catalog.detection_threshold))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Min area"),
        s.value.apply_to(format!("{} px", config.catalog.min_area))
    );
    println!();
}

pub fn print_catalog_table(catalog: &Catalog) {
    let s = Styles::new();

    println!();
    println!(
        "  {} {}",
        s.header.apply_to("Catalog"),
        s.label.apply_to(format!("({} stars)", catalog.len()))
    );
    println!(
        "    {}",
        s.label.apply_to(format!("{:>5}  {:>9}  {:>9}  {:>7}  flags", "index", "x", "y", "hfr"))
    );
    for i in 0..catalog.len() {
        let row = format!(
            "{:>5}  {:>9.2}  {:>9.2}  {:>7.2}",
            i, catalog.x[i], catalog.y[i], catalog.half_flux_radius[i]
        );
        let flags = describe(catalog.flags[i]);
        if flags.is_empty() {
            println!("    {}", s.value.apply_to(row));
        } else {
            println!("    {}  {}", s.value.apply_to(row), s.warning.apply_to(flags.join(" ")));
        }
    }
}

pub fn print_lightcurve_summary(set: &LightCurveSet, paths: &[PathBuf]) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Skyphot Light Curves"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(20)));
    println!();
    println!(
        "  {:<24}{}",
        s.label.apply_to("Lowest residual bkg"),
        s.value.apply_to(format!("setting {}", set.lowest_residual_setting))
    );
    println!();

    for (product, path) in set.products.iter().zip(paths) {
        println!("  {}", s.header.apply_to(&product.name));
        println!(
            "    {:<12}{}",
            s.label.apply_to("Aperture"),
            s.value.apply_to(format!("r = {:.2} px", product.radius))
        );
        match product.setting {
            Some(ref setting) => println!(
                "    {:<12}{}",
                s.label.apply_to("Background"),
                s.method.apply_to(setting)
            ),
            None => println!(
                "    {:<12}{}",
                s.label.apply_to("Background"),
                s.warning.apply_to("none")
            ),
        }
        if let Some(ref sel) = product.selection {
            println!(
                "    {:<12}{}",
                s.label.apply_to("SNR"),
                s.value.apply_to(format!("{:.1}", sel.snr))
            );
        }
        if let Some(ref best) = product.global_best {
            println!(
                "    {:<12}{}",
                s.label.apply_to("Global best"),
                s.label.apply_to(format!(
                    "radius {}, setting {}, SNR {:.1}",
                    best.radius_index, best.setting_index, best.snr
                ))
            );
        }
        println!(
            "    {:<12}{}",
            s.label.apply_to("FRMS"),
            s.value.apply_to(format!("{:.5}", product.frms))
        );
        println!(
            "    {:<12}{}",
            s.label.apply_to("Points"),
            s.value.apply_to(format!("{} ({} binned)", product.time.len(), product.time_bin.len()))
        );
        println!("    {:<12}{}", s.label.apply_to("File"), s.path.apply_to(path.display()));
        println!();
    }
}
