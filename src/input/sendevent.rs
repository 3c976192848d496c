// Raw event batch building. Every injection is a list of `sendevent`
// words joined into one on-device shell invocation, so a gesture lands
// atomically from the bridge's point of view.
use super::types::INPUT_DEV_PREFIX;

// Linux input event types and codes used by the injection paths.
pub const EV_SYN: u32 = 0;
pub const EV_KEY: u32 = 1;
pub const EV_ABS: u32 = 3;
pub const SYN_REPORT: u32 = 0;
pub const SYN_MT_REPORT: u32 = 2;
pub const BTN_TOUCH: u32 = 330;
pub const ABS_X: u32 = 0;
pub const ABS_Y: u32 = 1;
pub const ABS_MT_TOUCH_MAJOR: u32 = 48;
pub const ABS_MT_POSITION_X: u32 = 53;
pub const ABS_MT_POSITION_Y: u32 = 54;
pub const ABS_MT_TRACKING_ID: u32 = 57;

/// Nominal contact size reported with multi-touch points.
const MT_TOUCH_SIZE: i32 = 16;

/// One `sendevent` command for an event device node.
pub fn sendevent_cmd(device_index: u32, ev_type: u32, code: u32, value: i32) -> String {
    format!("sendevent {INPUT_DEV_PREFIX}{device_index} {ev_type} {code} {value}")
}

/// Key down, sync, key up, sync.
pub fn key_event_batch(device_index: u32, keycode: u32) -> Vec<String> {
    vec![
        sendevent_cmd(device_index, EV_KEY, keycode, 1),
        sendevent_cmd(device_index, EV_SYN, SYN_REPORT, 0),
        sendevent_cmd(device_index, EV_KEY, keycode, 0),
        sendevent_cmd(device_index, EV_SYN, SYN_REPORT, 0),
    ]
}

/// Legacy single-touch sequence. Press and release can be sent in
/// separate batches; a release at a new position drags there first.
pub fn single_touch_batch(
    device_index: u32,
    x: u32,
    y: u32,
    press: bool,
    release: bool,
) -> Vec<String> {
    let mut cmds = Vec::new();
    if press {
        cmds.push(sendevent_cmd(device_index, EV_ABS, ABS_X, x as i32));
        cmds.push(sendevent_cmd(device_index, EV_ABS, ABS_Y, y as i32));
        cmds.push(sendevent_cmd(device_index, EV_KEY, BTN_TOUCH, 1));
        cmds.push(sendevent_cmd(device_index, EV_SYN, SYN_REPORT, 0));
    }
    if release {
        if !press {
            cmds.push(sendevent_cmd(device_index, EV_ABS, ABS_X, x as i32));
            cmds.push(sendevent_cmd(device_index, EV_ABS, ABS_Y, y as i32));
            cmds.push(sendevent_cmd(device_index, EV_SYN, SYN_REPORT, 0));
        }
        cmds.push(sendevent_cmd(device_index, EV_KEY, BTN_TOUCH, 0));
        cmds.push(sendevent_cmd(device_index, EV_SYN, SYN_REPORT, 0));
    }
    cmds
}

/// Multi-touch (type A) gesture from `from` to `to`, lift included. The
/// whole gesture goes out as one batch; equal endpoints make it a tap.
pub fn multi_touch_batch(device_index: u32, from: (u32, u32), to: (u32, u32)) -> Vec<String> {
    let mut cmds = vec![
        sendevent_cmd(device_index, EV_ABS, ABS_MT_TRACKING_ID, 0),
        sendevent_cmd(device_index, EV_ABS, ABS_MT_POSITION_X, from.0 as i32),
        sendevent_cmd(device_index, EV_ABS, ABS_MT_POSITION_Y, from.1 as i32),
        sendevent_cmd(device_index, EV_ABS, ABS_MT_TOUCH_MAJOR, MT_TOUCH_SIZE),
        sendevent_cmd(device_index, EV_SYN, SYN_MT_REPORT, 0),
        sendevent_cmd(device_index, EV_SYN, SYN_REPORT, 0),
    ];
    if to != from {
        cmds.push(sendevent_cmd(device_index, EV_ABS, ABS_MT_POSITION_X, to.0 as i32));
        cmds.push(sendevent_cmd(device_index, EV_ABS, ABS_MT_POSITION_Y, to.1 as i32));
        cmds.push(sendevent_cmd(device_index, EV_ABS, ABS_MT_TOUCH_MAJOR, MT_TOUCH_SIZE));
        cmds.push(sendevent_cmd(device_index, EV_SYN, SYN_MT_REPORT, 0));
        cmds.push(sendevent_cmd(device_index, EV_SYN, SYN_REPORT, 0));
    }
    // empty report = all contacts lifted
    cmds.push(sendevent_cmd(device_index, EV_SYN, SYN_MT_REPORT, 0));
    cmds.push(sendevent_cmd(device_index, EV_SYN, SYN_REPORT, 0));
    cmds
}

/// Join a batch into the single string handed to `adb shell`.
pub fn join_batch(cmds: &[String]) -> String {
    cmds.join(";")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_batch_is_down_sync_up_sync() {
        let batch = key_event_batch(1, 116);
        assert_eq!(
            batch,
            vec![
                "sendevent /dev/input/event1 1 116 1",
                "sendevent /dev/input/event1 0 0 0",
                "sendevent /dev/input/event1 1 116 0",
                "sendevent /dev/input/event1 0 0 0",
            ]
        );
    }

    #[test]
    fn test_single_touch_press_only() {
        let batch = single_touch_batch(3, 120, 240, true, false);
        assert_eq!(
            batch,
            vec![
                "sendevent /dev/input/event3 3 0 120",
                "sendevent /dev/input/event3 3 1 240",
                "sendevent /dev/input/event3 1 330 1",
                "sendevent /dev/input/event3 0 0 0",
            ]
        );
    }

    #[test]
    fn test_single_touch_release_moves_first() {
        let batch = single_touch_batch(3, 50, 60, false, true);
        assert_eq!(batch.len(), 5, "move (3 cmds) then lift (2 cmds)");
        assert_eq!(batch[0], "sendevent /dev/input/event3 3 0 50");
        assert_eq!(batch[3], "sendevent /dev/input/event3 1 330 0");
    }

    #[test]
    fn test_single_touch_full_tap_has_press_and_release() {
        let batch = single_touch_batch(0, 10, 20, true, true);
        assert_eq!(batch.len(), 6);
        assert!(batch[2].ends_with("1 330 1"), "press");
        assert!(batch[4].ends_with("1 330 0"), "release");
    }

    #[test]
    fn test_multi_touch_tap_contacts_then_lifts() {
        let batch = multi_touch_batch(2, (100, 200), (100, 200));
        assert_eq!(batch.len(), 8, "contact (6) plus empty lift report (2)");
        assert_eq!(batch[0], "sendevent /dev/input/event2 3 57 0");
        assert_eq!(batch[1], "sendevent /dev/input/event2 3 53 100");
        assert_eq!(batch[2], "sendevent /dev/input/event2 3 54 200");
        assert_eq!(
            &batch[6..],
            &[
                "sendevent /dev/input/event2 0 2 0".to_string(),
                "sendevent /dev/input/event2 0 0 0".to_string(),
            ],
            "an empty report lifts the contact"
        );
    }

    #[test]
    fn test_multi_touch_gesture_inserts_move() {
        let batch = multi_touch_batch(2, (0, 0), (300, 400));
        assert_eq!(batch.len(), 13, "contact + move report + lift");
        assert!(batch[6].ends_with("3 53 300"), "move X");
        assert!(batch[7].ends_with("3 54 400"), "move Y");
    }

    #[test]
    fn test_join_batch_single_shell_word() {
        let joined = join_batch(&key_event_batch(0, 116));
        assert_eq!(joined.matches(';').count(), 3, "four commands, three joins");
        assert!(!joined.contains('\n'));
    }
}
