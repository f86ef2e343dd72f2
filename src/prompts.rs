//! Prompt text for every generation task.
//!
//! System prompts describe the role and the exact JSON shape each task must
//! answer with; user messages wrap their inputs in tagged sections.

use crate::record::{Camera, Character, ShotBrief, ShotDescription};

pub const DEVELOP_STORY: &str = "\
[Role]
You are an experienced story developer who turns a one-line idea into a complete, filmable short story.

[Input]
The idea is enclosed in <IDEA></IDEA> and optional requirements (audience, genre, length, number of scenes) in <USER_REQUIREMENT></USER_REQUIREMENT>.
When a previous draft was rejected, it is enclosed in <PREVIOUS_DRAFT></PREVIOUS_DRAFT> and the reviewer's feedback in <FEEDBACK></FEEDBACK>; the new draft must address that feedback.

[Output]
Return the story document only: a title, a one-paragraph summary, the main characters, then the full narrative. If a number of scenes is requested, divide the narrative into exactly that many titled scenes.

[Guidelines]
- Write in the language of the idea.
- Keep the idea at the center; expand vague ideas with consistent, motivated events.
- Show emotions through concrete actions, dialogue and visual detail.";

pub const EXTRACT_CHARACTERS: &str = "\
[Role]
You are a casting analyst who lists the recurring characters of a story.

[Output]
Answer with JSON: {\"characters\": [{\"idx\": 0, \"identifier_in_scene\": \"...\", \"is_visible\": true, \"static_features\": \"...\", \"dynamic_features\": \"...\"}]}
- idx counts from 0 in order of first appearance.
- identifier_in_scene is the unique name used for the character everywhere in the story.
- static_features describe appearance that never changes (face, build, hair); dynamic_features describe what may change between scenes (clothing, accessories).
- Ignore background extras. Use concrete, visual descriptions, never abstract traits.";

pub const WRITE_SCRIPT: &str = "\
[Role]
You are a screenwriter who adapts a story into scene scripts.

[Output]
Answer with JSON: {\"script\": [\"scene 0 script\", \"scene 1 script\", ...]}
- One entry per scene; a scene is continuous in time and place.
- Each script states the setting, the characters present, their actions and dialogue.
- Respect the scene count and other user requirements.";

pub const DESIGN_STORYBOARD: &str = "\
[Role]
You are a storyboard artist who breaks one scene script into shots.

[Output]
Answer with JSON: {\"storyboard\": [{\"idx\": 0, \"is_last\": false, \"cam_idx\": 0, \"visual_desc\": \"...\", \"audio_desc\": \"...\"}]}
- idx counts from 0; the final shot has is_last = true.
- cam_idx identifies the camera position; reuse an index whenever a later shot is taken from the same position (e.g. shot/reverse-shot dialogue). Number new cameras in order of first use, starting from 0.
- visual_desc names characters exactly as in the character list and states framing, composition and action.
- audio_desc covers dialogue, sound effects and music.";

pub const DESIGN_SHOT: &str = "\
[Role]
You are a cinematographer who expands a brief shot into frame-level directions.

[Output]
Answer with JSON: {\"ff_desc\": \"...\", \"lf_desc\": \"...\", \"motion_desc\": \"...\", \"audio_desc\": \"...\", \"variation_type\": \"small|medium|large\", \"ff_vis_char_idxs\": [0], \"lf_vis_char_idxs\": [0]}
- ff_desc and lf_desc describe the first and the last frame as still images.
- motion_desc describes camera and subject motion between them.
- variation_type rates how much the last frame differs from the first.
- *_vis_char_idxs list the indices of characters visible in each frame.";

pub const BUILD_CAMERA_TREE: &str = "\
[Role]
You are an editor who decides which camera's footage can serve as the visual reference for another camera.

[Input]
Cameras of one scene, each with the shots it captured, inside <CAMERAS></CAMERAS>.

[Output]
Answer with JSON: {\"camera_parent_items\": [null, {\"parent_cam_idx\": 0, \"parent_shot_idx\": 1, \"reason\": \"...\", \"is_parent_fully_covers_child\": true, \"missing_info\": null}]}
- Exactly one entry per camera, in the order given.
- The first camera is the root: its entry is null.
- Every other camera gets a parent chosen among the cameras listed before it, plus the parent's shot whose frame best covers this camera's view.
- When the parent only partly covers the child, set is_parent_fully_covers_child to false and describe what is missing.";

pub const PRESELECT_REFERENCES: &str = "\
[Role]
You are a visual continuity assistant choosing reference images for a frame that is about to be generated.

[Input]
The target frame in <FRAME_DESC></FRAME_DESC>; candidate descriptions in <SEQ_DESC></SEQ_DESC>, each prefixed \"Image N:\" with N counting from 0. Frame candidates are in chronological order.

[Output]
Answer with JSON: {\"ref_image_indices\": [..], \"text_prompt\": \"...\"}
- Select at most 8 candidates that keep characters, environment and style consistent.
- Prefer shots from the same camera and, among frames, the most recent ones.
- At most one portrait view per character; pick the view matching how the character faces the camera.
- Avoid redundant candidates.";

pub const SELECT_REFERENCES: &str = "\
[Role]
You are a visual continuity assistant choosing reference images for a frame that is about to be generated.

[Input]
The target frame in <FRAME_DESC></FRAME_DESC>; candidate images inside <SEQ_IMAGES></SEQ_IMAGES>, each introduced by \"Image N: description\" and followed by the image itself.

[Output]
Answer with JSON: {\"ref_image_indices\": [..], \"text_prompt\": \"...\"}
- Select at most 3 images and at most one image per character.
- Prefer shots from the same camera and, among frames, the most recent ones.
- text_prompt is a concise instruction for generating the frame that says which element comes from which reference.
- In text_prompt refer to references as \"Image 0\", \"Image 1\", ... by their position in ref_image_indices, never by their candidate number.";

pub fn story_request(idea: &str, requirement: &str, previous_draft: Option<(&str, &str)>) -> String {
    let mut message = format!(
        "<IDEA>\n{}\n</IDEA>\n\n<USER_REQUIREMENT>\n{}\n</USER_REQUIREMENT>\n",
        idea.trim(),
        requirement.trim()
    );
    if let Some((draft, feedback)) = previous_draft {
        message.push_str(&format!(
            "\n<PREVIOUS_DRAFT>\n{}\n</PREVIOUS_DRAFT>\n\n<FEEDBACK>\n{}\n</FEEDBACK>\n",
            draft.trim(),
            feedback.trim()
        ));
    }
    message
}

pub fn characters_request(story: &str) -> String {
    format!("<STORY>\n{}\n</STORY>\n", story.trim())
}

pub fn script_request(story: &str, requirement: &str) -> String {
    format!(
        "<STORY>\n{}\n</STORY>\n\n<USER_REQUIREMENT>\n{}\n</USER_REQUIREMENT>\n",
        story.trim(),
        requirement.trim()
    )
}

pub fn character_list(characters: &[Character]) -> String {
    characters
        .iter()
        .map(|c| format!("Character {}: {} {}", c.index, c.identifier, c.feature_summary()))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn storyboard_request(script: &str, characters: &[Character], requirement: &str) -> String {
    format!(
        "<SCRIPT>\n{}\n</SCRIPT>\n\n<CHARACTERS>\n{}\n</CHARACTERS>\n\n<USER_REQUIREMENT>\n{}\n</USER_REQUIREMENT>\n",
        script.trim(),
        character_list(characters),
        requirement.trim()
    )
}

pub fn shot_request(brief: &ShotBrief, characters: &[Character], style: &str) -> String {
    format!(
        "<CHARACTERS>\n{}\n</CHARACTERS>\n\n<SHOT>\n[Camera {}] {}\nAudio: {}\n</SHOT>\n\n<STYLE>\n{}\n</STYLE>\n",
        character_list(characters),
        brief.camera_index,
        brief.visual_description.trim(),
        brief.audio_description.trim(),
        style.trim()
    )
}

pub fn camera_tree_request(cameras: &[Camera], shots: &[ShotDescription]) -> String {
    let mut message = String::from("<CAMERAS>\n");
    for camera in cameras {
        message.push_str(&format!("Camera {}:\n", camera.index));
        for shot_index in &camera.shot_indices {
            if let Some(shot) = shots.iter().find(|s| s.index == *shot_index) {
                message.push_str(&format!("  Shot {}: {}\n", shot.index, shot.first_frame.trim()));
            }
        }
    }
    message.push_str("</CAMERAS>\n");
    message
}

pub fn portrait_front(identifier: &str, features: &str, style: &str) -> String {
    format!(
        "Generate a full-body, front-view portrait of {identifier} on a plain white background. \
         Features: {features}. Style: {style}."
    )
}

pub fn portrait_turn(identifier: &str, view: &str) -> String {
    format!(
        "Keep the character in the reference image identical and show a full-body {view} view of \
         {identifier} on a plain white background."
    )
}

pub fn portrait_description(identifier: &str, view: &str) -> String {
    format!("A {view} view portrait of {identifier}.")
}

pub fn frame_description(camera_index: usize, description: &str) -> String {
    format!("[Camera {}] {}", camera_index, description.trim())
}

pub fn video_prompt(shot: &ShotDescription) -> String {
    format!("{}\n{}", shot.motion.trim(), shot.audio.trim())
}
