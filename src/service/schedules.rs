// service/schedules.rs
use serde::{Deserialize, Serialize};

/// A bookable meeting room: an external booking page plus an embeddable
/// calendar showing its schedule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Room {
    pub name: String,
    pub booking_url: String,
    pub calendar_url: String,
}

impl Room {
    pub fn defaults() -> Vec<Room> {
        vec![
            Room {
                name: "INTEGRIDADE".to_string(),
                booking_url: "https://koalendar.com/e/integridade".to_string(),
                calendar_url: "https://calendar.google.com/calendar/embed?src=sala.1.integridade%40gmail.com&ctz=America%2FFortaleza".to_string(),
            },
            Room {
                name: "VALORIZAÇÃO DAS PESSOAS".to_string(),
                booking_url: "https://koalendar.com/e/2valorizacao-das-pessoas".to_string(),
                calendar_url: "https://calendar.google.com/calendar/embed?src=sala.2.valorizacaodaspessoas%40gmail.com&ctz=America%2FFortaleza".to_string(),
            },
            Room {
                name: "INOVAÇÃO".to_string(),
                booking_url: "https://koalendar.com/e/inovacao".to_string(),
                calendar_url: "https://calendar.google.com/calendar/embed?src=sala.3.inovacao%40gmail.com&ctz=America%2FFortaleza".to_string(),
            },
        ]
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RoomView {
    pub index: usize,
    pub room: Room,
    pub previous: Option<usize>,
    pub next: Option<usize>,
}

/// The room at `index` with the neighbours a viewer can step to.
pub fn room_at(rooms: &[Room], index: usize) -> Option<RoomView> {
    let room = rooms.get(index)?.clone();
    Some(RoomView {
        index,
        room,
        previous: index.checked_sub(1),
        next: if index + 1 < rooms.len() { Some(index + 1) } else { None },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigation_stops_at_the_ends() {
        let rooms = Room::defaults();

        let first = room_at(&rooms, 0).unwrap();
        assert_eq!(first.previous, None);
        assert_eq!(first.next, Some(1));

        let last = room_at(&rooms, rooms.len() - 1).unwrap();
        assert_eq!(last.previous, Some(rooms.len() - 2));
        assert_eq!(last.next, None);

        assert!(room_at(&rooms, rooms.len()).is_none());
    }

    #[test]
    fn single_room_has_no_neighbours() {
        let rooms = vec![Room::defaults().remove(0)];
        let view = room_at(&rooms, 0).unwrap();
        assert_eq!((view.previous, view.next), (None, None));
    }

    #[test]
    fn rooms_parse_from_json() {
        let raw = r#"[{"name":"Lab","booking_url":"https://b/lab","calendar_url":"https://c/lab"}]"#;
        let rooms: Vec<Room> = serde_json::from_str(raw).unwrap();
        assert_eq!(rooms[0].name, "Lab");
    }
}
