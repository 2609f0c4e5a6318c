// SPDX-License-Identifier: MPL-2.0

use vdagent_display::LayoutEntry;

/// Parses `ID:WxH+X+Y`, where offsets may be negative (`ID:WxH-X+Y`) or omitted.
pub fn parse_entry(arg: &str) -> Result<LayoutEntry, String> {
    let (display_id, geometry) = arg
        .split_once(':')
        .ok_or_else(|| format!("expected ID:WxH+X+Y, found `{arg}`"))?;

    let display_id = display_id
        .parse::<u32>()
        .map_err(|why| format!("invalid display id `{display_id}`: {why}"))?;

    let (size, offsets) = geometry.split_at(geometry.find(['+', '-']).unwrap_or(geometry.len()));

    let (width, height) = size
        .split_once('x')
        .ok_or_else(|| format!("expected WxH, found `{size}`"))?;

    let width = dimension(width)?;
    let height = dimension(height)?;

    let (x, y) = if offsets.is_empty() {
        (0, 0)
    } else {
        // The second offset begins at the next sign after the first.
        let split = offsets[1..]
            .find(['+', '-'])
            .map(|at| at + 1)
            .ok_or_else(|| format!("expected +X+Y, found `{offsets}`"))?;

        let (x, y) = offsets.split_at(split);
        (offset(x)?, offset(y)?)
    };

    Ok(LayoutEntry {
        display_id,
        width,
        height,
        x,
        y,
    })
}

fn dimension(value: &str) -> Result<i32, String> {
    match value.parse::<i32>() {
        Ok(value) if value > 0 => Ok(value),
        Ok(_) => Err(format!("dimension must be positive, found `{value}`")),
        Err(why) => Err(format!("invalid dimension `{value}`: {why}")),
    }
}

fn offset(value: &str) -> Result<i32, String> {
    // `+-20` is accepted as `-20`
    let digits = value.strip_prefix('+').unwrap_or(value);

    digits
        .parse::<i32>()
        .map_err(|why| format!("invalid offset `{value}`: {why}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(display_id: u32, width: i32, height: i32, x: i32, y: i32) -> LayoutEntry {
        LayoutEntry {
            display_id,
            width,
            height,
            x,
            y,
        }
    }

    #[test]
    fn full_geometry() {
        assert_eq!(parse_entry("1:1280x1024+1920+0"), Ok(entry(1, 1280, 1024, 1920, 0)));
    }

    #[test]
    fn negative_offsets() {
        assert_eq!(parse_entry("0:800x600-800+-20"), Ok(entry(0, 800, 600, -800, -20)));
        assert_eq!(parse_entry("2:800x600+0-600"), Ok(entry(2, 800, 600, 0, -600)));
    }

    #[test]
    fn offsets_default_to_origin() {
        assert_eq!(parse_entry("3:1920x1080"), Ok(entry(3, 1920, 1080, 0, 0)));
    }

    #[test]
    fn malformed() {
        assert!(parse_entry("1920x1080+0+0").is_err());
        assert!(parse_entry("a:1920x1080").is_err());
        assert!(parse_entry("0:1920+0+0").is_err());
        assert!(parse_entry("0:0x1080").is_err());
        assert!(parse_entry("0:1920x1080+5").is_err());
    }
}
