//! The axis-homing G-code template (SPEC_FULL.md §6.5).
//!
//! A small MDI program, parameterized on the axis letter, whose variable
//! references are expanded by the planner engine's resolver (`_<axis>_*`
//! names routed through [`mc_state`]'s axis→motor mapping). Kept as a
//! format string rather than built from typed motion primitives — the
//! engine only ever sees G-code text (§9 Design Notes).

/// Build the homing MDI program for a single axis.
///
/// Conceptually: mark unhomed, fast-seek toward the limit switch, back off
/// at latch velocity, slow-seek back onto the switch, rapid to the
/// zero-backoff point, then record the home position.
pub fn homing_template(axis: char) -> String {
    let a = axis;
    format!(
        "G28.2 {a}0 F[#<_{a}_sv>]\n\
         G38.6 {a}[#<_{a}_hd> * [#<_{a}_tm> - #<_{a}_tn>] * 1.5]\n\
         G38.8 {a}[#<_{a}_hd> * -#<_{a}_lb>] F[#<_{a}_lv>]\n\
         G38.6 {a}[#<_{a}_hd> * #<_{a}_lb> * 1.5]\n\
         G91 G0 G53 {a}[#<_{a}_hd> * -#<_{a}_zb>]\n\
         G90 G28.3 {a}[#<_{a}_hp>]\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_substitutes_axis_letter() {
        let gcode = homing_template('z');
        assert!(gcode.starts_with("G28.2 z0"));
        assert!(gcode.contains("#<_z_hd>"));
        assert!(gcode.contains("G28.3 z[#<_z_hp>]"));
        assert_eq!(gcode.lines().count(), 6);
    }

    #[test]
    fn template_has_no_leftover_placeholders() {
        let gcode = homing_template('x');
        assert!(!gcode.contains("%(axis)s"));
        assert!(!gcode.contains("{a}"));
    }
}
